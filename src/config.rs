use std::env;

/// What to do when a crew member who is offline or out on another job is assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusyCrewPolicy {
    Reject,
    Warn,
}

impl BusyCrewPolicy {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => BusyCrewPolicy::Warn,
            _ => BusyCrewPolicy::Reject,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CrewRules {
    pub max_crew_per_booking: usize,
    pub busy_policy: BusyCrewPolicy,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub admin_user_id: String,
    pub max_crew_per_booking: usize,
    pub busy_crew_policy: BusyCrewPolicy,
    pub notify_webhook_url: String,
    pub notify_webhook_secret: String,
    pub notify_webhook_retries: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "washdesk.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            admin_user_id: env::var("ADMIN_USER_ID").unwrap_or_else(|_| "admin".to_string()),
            max_crew_per_booking: env::var("MAX_CREW_PER_BOOKING")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(4),
            busy_crew_policy: env::var("BUSY_CREW_POLICY")
                .map(|v| BusyCrewPolicy::parse(&v))
                .unwrap_or(BusyCrewPolicy::Reject),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").unwrap_or_default(),
            notify_webhook_secret: env::var("NOTIFY_WEBHOOK_SECRET").unwrap_or_default(),
            notify_webhook_retries: env::var("NOTIFY_WEBHOOK_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }

    pub fn crew_rules(&self) -> CrewRules {
        CrewRules {
            max_crew_per_booking: self.max_crew_per_booking,
            busy_policy: self.busy_crew_policy,
        }
    }
}
