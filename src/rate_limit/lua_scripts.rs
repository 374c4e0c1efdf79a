/// Lua script for sliding window admission in Redis
///
/// Every admitted request is recorded in a sorted set scored by the Redis
/// server clock (microseconds), so all processes sharing the store agree on
/// time. Entries older than one window are pruned before counting, which
/// caps admissions at `capacity` over any window-length interval. The whole
/// check-and-record runs inside the script and is therefore atomic.
///
/// KEYS[1] = the bucket key
/// ARGV[1] = capacity
/// ARGV[2] = window duration (microseconds)
/// ARGV[3] = unique member id for this attempt
///
/// Returns: [admitted (0/1), available tokens after this attempt]
///
/// Exercised against a live server by the ignored tests in `redis.rs`.
pub const SLIDING_WINDOW_ADMIT_SCRIPT: &str = r#"
if redis.replicate_commands then
    redis.replicate_commands()
end

local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local member = ARGV[3]

local time = redis.call('TIME')
local now = tonumber(time[1]) * 1000000 + tonumber(time[2])

-- Expire admissions that fell out of the window
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)

local used = redis.call('ZCARD', key)
local admitted = 0

if used < capacity then
    redis.call('ZADD', key, now, time[1] .. '.' .. time[2] .. ':' .. member)
    used = used + 1
    admitted = 1
end

if used > 0 then
    redis.call('PEXPIRE', key, math.ceil(window / 1000))
end

return {admitted, capacity - used}
"#;
