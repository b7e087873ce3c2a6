//! Environment-driven runtime configuration, read once at startup.

use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use indexmap::IndexMap;
use tracing::{info, warn};

/// Service domains that can be mounted by a `services` process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Users,
    Catalog,
    Reviews,
    Shopping,
    Purchases,
    Payments,
    Online,
    Social,
    Notifications,
    Recommendations,
    Achievements,
    Forum,
    Workshop,
}

impl Domain {
    /// Every domain, in gateway routing order.
    pub const ALL: [Domain; 13] = [
        Domain::Users,
        Domain::Catalog,
        Domain::Reviews,
        Domain::Shopping,
        Domain::Purchases,
        Domain::Payments,
        Domain::Online,
        Domain::Social,
        Domain::Notifications,
        Domain::Recommendations,
        Domain::Achievements,
        Domain::Forum,
        Domain::Workshop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Domain::Users => "users",
            Domain::Catalog => "catalog",
            Domain::Reviews => "reviews",
            Domain::Shopping => "shopping",
            Domain::Purchases => "purchases",
            Domain::Payments => "payments",
            Domain::Online => "online",
            Domain::Social => "social",
            Domain::Notifications => "notifications",
            Domain::Recommendations => "recommendations",
            Domain::Achievements => "achievements",
            Domain::Forum => "forum",
            Domain::Workshop => "workshop",
        }
    }

    /// Path prefix the domain is mounted under.
    pub fn prefix(self) -> String {
        format!("/api/v1/{}", self.name())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|domain| domain.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown service domain `{value}`"))
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Gateway routing table: path prefix, upstream URL variable, default URL.
/// `/api/v1/friends` fronts the separate friends-chat service.
pub const GATEWAY_UPSTREAMS: [(&str, &str, &str); 14] = [
    ("/api/v1/users", "USER_SERVICE_URL", "http://localhost:8001"),
    ("/api/v1/catalog", "GAME_CATALOG_SERVICE_URL", "http://localhost:8002"),
    ("/api/v1/reviews", "REVIEW_SERVICE_URL", "http://localhost:8003"),
    ("/api/v1/shopping", "SHOPPING_SERVICE_URL", "http://localhost:8004"),
    ("/api/v1/purchases", "PURCHASE_SERVICE_URL", "http://localhost:8005"),
    ("/api/v1/payments", "PAYMENT_SERVICE_URL", "http://localhost:8006"),
    ("/api/v1/online", "ONLINE_SERVICE_URL", "http://localhost:8007"),
    ("/api/v1/social", "SOCIAL_SERVICE_URL", "http://localhost:8008"),
    ("/api/v1/notifications", "NOTIFICATION_SERVICE_URL", "http://localhost:8009"),
    ("/api/v1/recommendations", "RECOMMENDATION_SERVICE_URL", "http://localhost:8010"),
    ("/api/v1/achievements", "ACHIEVEMENT_SERVICE_URL", "http://localhost:8011"),
    ("/api/v1/friends", "FRIENDS_CHAT_SERVICE_URL", "http://localhost:8013"),
    ("/api/v1/workshop", "WORKSHOP_SERVICE_URL", "http://localhost:8014"),
    ("/api/v1/forum", "FORUM_SERVICE_URL", "http://localhost:8015"),
];

/// Which surface this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Services,
    Gateway,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Mongo { uri: String, database: String },
}

#[derive(Debug, Clone)]
pub struct AchievementSettings {
    pub star_token_score_step: i64,
    pub leaderboard_max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct OnlineSettings {
    pub lobby_max_members: u32,
    pub lobby_message_history_limit: usize,
}

#[derive(Debug, Clone)]
pub struct WorkshopSettings {
    pub banned_keywords: Vec<String>,
    pub auto_approval_score: f64,
    /// Directory receiving uploaded item files.
    pub storage_path: PathBuf,
    pub max_file_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct RecommenderSettings {
    pub model_path: Option<PathBuf>,
    pub min_interactions: usize,
    pub n_components: usize,
    pub max_recommendations: usize,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub rate_limit_per_minute: u32,
    pub redis_url: Option<String>,
    /// Path prefix to upstream base URL, matched in insertion order.
    pub upstreams: IndexMap<String, String>,
    pub upstream_timeout: Duration,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub role: Role,
    pub port: u16,
    pub domains: Vec<Domain>,
    pub storage: StorageBackend,
    pub auth_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    /// bcrypt work factor for new password hashes.
    pub password_hash_cost: u32,
    pub admin_token: Option<String>,
    pub notification_service_url: Option<String>,
    pub user_service_url: Option<String>,
    pub achievements: AchievementSettings,
    pub online: OnlineSettings,
    pub workshop: WorkshopSettings,
    pub recommender: RecommenderSettings,
    pub gateway: GatewaySettings,
}

impl AppConfig {
    /// Load the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let source = Source { lookup: &lookup };

        let role = match source.raw("STOREFRONT_ROLE").as_deref() {
            Some("gateway") => Role::Gateway,
            Some("services") | None => Role::Services,
            Some(other) => {
                warn!(value = other, "unknown STOREFRONT_ROLE; serving domain services");
                Role::Services
            }
        };

        let default_port = match role {
            Role::Services => 8080,
            Role::Gateway => 8000,
        };
        let port = source
            .raw("PORT")
            .or_else(|| source.raw("SERVER_PORT"))
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(default_port);

        let domains = match source.raw("STOREFRONT_SERVICES") {
            Some(list) => {
                let parsed: Vec<Domain> = list
                    .split(',')
                    .filter(|item| !item.trim().is_empty())
                    .filter_map(|item| match item.parse::<Domain>() {
                        Ok(domain) => Some(domain),
                        Err(err) => {
                            warn!(error = %err, "ignoring entry of STOREFRONT_SERVICES");
                            None
                        }
                    })
                    .collect();
                if parsed.is_empty() {
                    Domain::ALL.to_vec()
                } else {
                    parsed
                }
            }
            None => Domain::ALL.to_vec(),
        };

        let default_backend = if cfg!(feature = "mongo-store") {
            "mongo"
        } else {
            "memory"
        };
        let storage = match source
            .raw("STORAGE_BACKEND")
            .as_deref()
            .unwrap_or(default_backend)
        {
            "memory" => StorageBackend::Memory,
            _ => StorageBackend::Mongo {
                uri: source.or("MONGO_URI", "mongodb://localhost:27017"),
                database: source.or("MONGO_DB", "storefront"),
            },
        };

        let auth_secret = match source.raw("SECRET_KEY").or_else(|| source.raw("AUTH_SECRET")) {
            Some(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!("SECRET_KEY not set; generating an ephemeral signing key");
                rand::random::<[u8; 32]>().to_vec()
            }
        };

        let upstreams = GATEWAY_UPSTREAMS
            .into_iter()
            .map(|(prefix, key, fallback)| (prefix.to_owned(), source.or(key, fallback)))
            .collect();

        Self {
            role,
            port,
            domains,
            storage,
            auth_secret,
            access_token_ttl: Duration::from_secs(
                source.parse("ACCESS_TOKEN_EXPIRE_MINUTES", 30u64) * 60,
            ),
            password_hash_cost: source
                .parse("BCRYPT_ROUNDS", bcrypt::DEFAULT_COST)
                .clamp(4, 31),
            admin_token: source.raw("ADMIN_TOKEN").filter(|token| !token.is_empty()),
            notification_service_url: source.raw("NOTIFICATION_SERVICE_URL"),
            user_service_url: source.raw("USER_SERVICE_URL"),
            achievements: AchievementSettings {
                star_token_score_step: source.parse("STAR_TOKEN_SCORE_STEP", 500i64).max(1),
                leaderboard_max_entries: source.parse("LEADERBOARD_MAX_ENTRIES", 1000usize),
            },
            online: OnlineSettings {
                lobby_max_members: source.parse("LOBBY_MAX_MEMBERS", 8u32).max(2),
                lobby_message_history_limit: source.parse("LOBBY_MESSAGE_HISTORY_LIMIT", 50usize),
            },
            workshop: WorkshopSettings {
                banned_keywords: source
                    .or("WORKSHOP_BANNED_KEYWORDS", "hack,cheat,virus")
                    .split(',')
                    .map(|word| word.trim().to_lowercase())
                    .filter(|word| !word.is_empty())
                    .collect(),
                auto_approval_score: source.parse("WORKSHOP_AUTO_APPROVAL_SCORE", 0.65f64),
                storage_path: PathBuf::from(
                    source.or("WORKSHOP_STORAGE_PATH", "/tmp/workshop_uploads"),
                ),
                max_file_bytes: source
                    .parse("WORKSHOP_MAX_FILE_MB", 500u64)
                    .max(1)
                    .saturating_mul(1024 * 1024),
            },
            recommender: RecommenderSettings {
                model_path: source.raw("RECOMMENDATION_MODEL_PATH").map(PathBuf::from),
                min_interactions: source.parse("CF_MIN_INTERACTIONS", 5usize),
                n_components: source.parse("CF_N_COMPONENTS", 20usize),
                max_recommendations: source.parse("CF_MAX_RECOMMENDATIONS", 50usize),
            },
            gateway: GatewaySettings {
                rate_limit_per_minute: source.parse("RATE_LIMIT_PER_MINUTE", 60u32),
                redis_url: source.raw("REDIS_URL"),
                upstreams,
                upstream_timeout: Duration::from_secs(30),
            },
        }
    }

    /// In-memory configuration with fixed secrets, used by tests.
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "STORAGE_BACKEND" => Some("memory".into()),
            "SECRET_KEY" => Some("test-secret".into()),
            "BCRYPT_ROUNDS" => Some("4".into()),
            "ADMIN_TOKEN" => Some("admin".into()),
            "WORKSHOP_STORAGE_PATH" => Some(
                env::temp_dir()
                    .join("storefront-workshop-tests")
                    .to_string_lossy()
                    .into_owned(),
            ),
            _ => None,
        })
    }
}

struct Source<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Source<'_> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|value| value.trim().to_owned())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + Display + Copy,
        T::Err: Display,
    {
        match self.raw(key) {
            Some(value) => match value.parse::<T>() {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(key, value = %value, error = %err, %default, "invalid setting; using default");
                    default
                }
            },
            None => {
                info!(key, %default, "setting not provided; using default");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_list_filters_unknown_entries() {
        let config = AppConfig::from_lookup(|key| match key {
            "STOREFRONT_SERVICES" => Some("users, forum,bogus".into()),
            _ => None,
        });
        assert_eq!(config.domains, vec![Domain::Users, Domain::Forum]);
        assert_eq!(config.role, Role::Services);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn gateway_defaults_cover_every_domain() {
        let config = AppConfig::from_lookup(|key| match key {
            "STOREFRONT_ROLE" => Some("gateway".into()),
            "FORUM_SERVICE_URL" => Some("http://forum:9000".into()),
            "GAME_CATALOG_SERVICE_URL" => Some("http://catalog:9001".into()),
            "RATE_LIMIT_PER_MINUTE" => Some("not-a-number".into()),
            _ => None,
        });
        assert_eq!(config.port, 8000);
        for domain in Domain::ALL {
            assert!(
                config.gateway.upstreams.contains_key(&domain.prefix()),
                "{domain} has no upstream"
            );
        }
        let upstream = |prefix: &str| config.gateway.upstreams.get(prefix).map(String::as_str);
        assert_eq!(upstream("/api/v1/catalog"), Some("http://catalog:9001"));
        assert_eq!(upstream("/api/v1/reviews"), Some("http://localhost:8003"));
        assert_eq!(upstream("/api/v1/friends"), Some("http://localhost:8013"));
        assert_eq!(upstream("/api/v1/workshop"), Some("http://localhost:8014"));
        assert_eq!(
            config.gateway.upstreams.get("/api/v1/forum").map(String::as_str),
            Some("http://forum:9000")
        );
        assert_eq!(
            config.gateway.upstreams.get("/api/v1/users").map(String::as_str),
            Some("http://localhost:8001")
        );
        assert_eq!(config.gateway.rate_limit_per_minute, 60);
    }
}
