use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub organization_id: u64,
    pub dundie_awards: u32,
}

/// Employee as returned by the API, with the organization name resolved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDto {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub organization_id: u64,
    pub organization_name: String,
    pub dundie_awards: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRequest {
    pub first_name: String,
    pub last_name: String,
    pub organization_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: u64,
    pub occurred_at: DateTime<Utc>,
    pub event: String,
    pub employee_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    pub event: String,
    pub employee_id: u64,
}
