//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Instant;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

/// Run all component checks and aggregate the overall state.
pub async fn run_checks(pool: &PgPool) -> HealthStatus {
    let mut checks = HashMap::new();

    let start = Instant::now();
    let database = match crate::database::health_check(pool).await {
        Ok(()) => ComponentHealth::up(Some(start.elapsed().as_millis())),
        Err(e) => ComponentHealth::down(Some(e.to_string())),
    };
    let healthy = database.status == ComponentState::Up;
    checks.insert("database".to_string(), database);

    HealthStatus {
        status: if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        },
        checks,
        timestamp: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_constructors() {
        let up = ComponentHealth::up(Some(3));
        assert_eq!(up.status, ComponentState::Up);
        assert_eq!(up.response_time_ms, Some(3));

        let down = ComponentHealth::down(Some("connection refused".to_string()));
        assert_eq!(down.status, ComponentState::Down);
        assert!(down.details.is_some());
    }
}
