use super::models::{
    Activity, CreateActivityRequest, Employee, EmployeeDto, EmployeeRequest, Organization,
    OrganizationRequest,
};
use crate::error::{AppError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory stand-in for the persistence layer
#[derive(Clone, Default)]
pub struct Repository {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    organizations: BTreeMap<u64, Organization>,
    employees: BTreeMap<u64, Employee>,
    activities: BTreeMap<u64, Activity>,
    last_id: u64,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn organization(&self, id: u64) -> Result<&Organization> {
        self.organizations
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", id)))
    }

    fn employee_mut(&mut self, id: u64) -> Result<&mut Employee> {
        self.employees
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))
    }

    fn to_dto(&self, employee: &Employee) -> EmployeeDto {
        let organization_name = self
            .organizations
            .get(&employee.organization_id)
            .map(|o| o.name.clone())
            .unwrap_or_default();

        EmployeeDto {
            id: employee.id,
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            organization_id: employee.organization_id,
            organization_name,
            dundie_awards: employee.dundie_awards,
        }
    }

    fn record_activity(&mut self, employee_id: u64, event: String) -> Activity {
        let activity = Activity {
            id: self.next_id(),
            occurred_at: Utc::now(),
            event,
            employee_id,
        };
        self.activities.insert(activity.id, activity.clone());
        activity
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} must not be blank", field)));
    }
    Ok(())
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list_organizations(&self) -> Vec<Organization> {
        self.inner.read().await.organizations.values().cloned().collect()
    }

    pub async fn get_organization(&self, id: u64) -> Result<Organization> {
        self.inner.read().await.organization(id).cloned()
    }

    pub async fn create_organization(&self, req: OrganizationRequest) -> Result<Organization> {
        require("name", &req.name)?;

        let mut inner = self.inner.write().await;
        let organization = Organization {
            id: inner.next_id(),
            name: req.name,
        };
        inner
            .organizations
            .insert(organization.id, organization.clone());
        Ok(organization)
    }

    pub async fn list_employees(&self) -> Vec<EmployeeDto> {
        let inner = self.inner.read().await;
        inner.employees.values().map(|e| inner.to_dto(e)).collect()
    }

    pub async fn get_employee(&self, id: u64) -> Result<EmployeeDto> {
        let inner = self.inner.read().await;
        inner
            .employees
            .get(&id)
            .map(|e| inner.to_dto(e))
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))
    }

    pub async fn create_employee(&self, req: EmployeeRequest) -> Result<EmployeeDto> {
        require("firstName", &req.first_name)?;
        require("lastName", &req.last_name)?;

        let mut inner = self.inner.write().await;
        inner.organization(req.organization_id)?;

        let employee = Employee {
            id: inner.next_id(),
            first_name: req.first_name,
            last_name: req.last_name,
            organization_id: req.organization_id,
            dundie_awards: 0,
        };
        inner.employees.insert(employee.id, employee.clone());
        Ok(inner.to_dto(&employee))
    }

    pub async fn update_employee(&self, id: u64, req: EmployeeRequest) -> Result<EmployeeDto> {
        require("firstName", &req.first_name)?;
        require("lastName", &req.last_name)?;

        let mut inner = self.inner.write().await;
        inner.organization(req.organization_id)?;

        let employee = inner.employee_mut(id)?;
        employee.first_name = req.first_name;
        employee.last_name = req.last_name;
        employee.organization_id = req.organization_id;
        let employee = employee.clone();

        Ok(inner.to_dto(&employee))
    }

    /// Delete an employee together with its activities
    pub async fn delete_employee(&self, id: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .employees
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))?;
        inner.activities.retain(|_, a| a.employee_id != id);
        Ok(())
    }

    /// Give an employee one award and log it as an activity
    pub async fn award_employee(&self, id: u64) -> Result<EmployeeDto> {
        let mut inner = self.inner.write().await;

        let employee = inner.employee_mut(id)?;
        employee.dundie_awards += 1;
        let employee = employee.clone();

        inner.record_activity(
            id,
            format!(
                "{} {} received a Dundie award",
                employee.first_name, employee.last_name
            ),
        );
        Ok(inner.to_dto(&employee))
    }

    /// Give every employee of an organization one award
    pub async fn award_organization(&self, organization_id: u64) -> Result<Vec<EmployeeDto>> {
        let mut inner = self.inner.write().await;
        inner.organization(organization_id)?;

        let ids: Vec<u64> = inner
            .employees
            .values()
            .filter(|e| e.organization_id == organization_id)
            .map(|e| e.id)
            .collect();

        let mut awarded = Vec::with_capacity(ids.len());
        for id in ids {
            let employee = inner.employee_mut(id)?;
            employee.dundie_awards += 1;
            let employee = employee.clone();

            inner.record_activity(
                id,
                format!(
                    "{} {} received a Dundie award",
                    employee.first_name, employee.last_name
                ),
            );
            awarded.push(inner.to_dto(&employee));
        }

        Ok(awarded)
    }

    /// Take one award away; a count of zero stays zero
    pub async fn remove_award(&self, id: u64) -> Result<EmployeeDto> {
        let mut inner = self.inner.write().await;

        let employee = inner.employee_mut(id)?;
        employee.dundie_awards = employee.dundie_awards.saturating_sub(1);
        let employee = employee.clone();

        Ok(inner.to_dto(&employee))
    }

    pub async fn list_activities(&self) -> Vec<Activity> {
        self.inner.read().await.activities.values().cloned().collect()
    }

    pub async fn get_activity(&self, id: u64) -> Result<Activity> {
        self.inner
            .read()
            .await
            .activities
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }

    pub async fn create_activity(&self, req: CreateActivityRequest) -> Result<Activity> {
        require("event", &req.event)?;

        let mut inner = self.inner.write().await;
        inner.employee_mut(req.employee_id)?;
        Ok(inner.record_activity(req.employee_id, req.event))
    }

    pub async fn delete_activity(&self, id: u64) -> Result<()> {
        self.inner
            .write()
            .await
            .activities
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (Repository, Organization) {
        let repo = Repository::new();
        let org = repo
            .create_organization(OrganizationRequest {
                name: "Dunder Mifflin".to_string(),
            })
            .await
            .unwrap();
        (repo, org)
    }

    fn request(first: &str, last: &str, organization_id: u64) -> EmployeeRequest {
        EmployeeRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            organization_id,
        }
    }

    #[tokio::test]
    async fn test_create_employee_resolves_organization() {
        let (repo, org) = seeded().await;
        let employee = repo.create_employee(request("Jim", "Halpert", org.id)).await.unwrap();

        assert_eq!(employee.organization_name, "Dunder Mifflin");
        assert_eq!(employee.dundie_awards, 0);
        assert_eq!(repo.list_employees().await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_employee_unknown_organization() {
        let repo = Repository::new();
        let result = repo.create_employee(request("Jim", "Halpert", 99)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let (repo, org) = seeded().await;
        let result = repo.create_employee(request(" ", "Halpert", org.id)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_award_records_activity() {
        let (repo, org) = seeded().await;
        let employee = repo.create_employee(request("Pam", "Beesly", org.id)).await.unwrap();

        let awarded = repo.award_employee(employee.id).await.unwrap();
        assert_eq!(awarded.dundie_awards, 1);

        let activities = repo.list_activities().await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].employee_id, employee.id);

        let removed = repo.remove_award(employee.id).await.unwrap();
        assert_eq!(removed.dundie_awards, 0);
        let removed = repo.remove_award(employee.id).await.unwrap();
        assert_eq!(removed.dundie_awards, 0);
    }

    #[tokio::test]
    async fn test_award_organization_only_touches_its_members() {
        let (repo, org) = seeded().await;
        let other = repo
            .create_organization(OrganizationRequest {
                name: "Vance Refrigeration".to_string(),
            })
            .await
            .unwrap();
        repo.create_employee(request("Jim", "Halpert", org.id)).await.unwrap();
        repo.create_employee(request("Pam", "Beesly", org.id)).await.unwrap();
        let bob = repo.create_employee(request("Bob", "Vance", other.id)).await.unwrap();

        let awarded = repo.award_organization(org.id).await.unwrap();
        assert_eq!(awarded.len(), 2);
        assert!(awarded.iter().all(|e| e.dundie_awards == 1));
        assert_eq!(repo.list_activities().await.len(), 2);
        assert_eq!(repo.get_employee(bob.id).await.unwrap().dundie_awards, 0);

        assert!(matches!(
            repo.award_organization(999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_employee_removes_activities() {
        let (repo, org) = seeded().await;
        let employee = repo.create_employee(request("Dwight", "Schrute", org.id)).await.unwrap();
        repo.award_employee(employee.id).await.unwrap();

        repo.delete_employee(employee.id).await.unwrap();
        assert!(repo.list_activities().await.is_empty());
        assert!(matches!(
            repo.get_employee(employee.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
