mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, JwtConfig, OtelConfig, ProfileOverride, RateLimitSettings,
    RedisConfig, ServerConfig, Settings,
};
