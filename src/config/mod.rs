use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEV_STAGING_SUBDIR: &str = "temp/upload";
const PROD_STAGING_DIRNAME: &str = "file-converter-uploads";

/// Deployment environment, selects the default staging location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match env::var("APP_ENV").map(|v| v.to_lowercase()) {
            Ok(v) if v == "production" || v == "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    /// Default staging directory for this environment
    pub fn default_staging_dir(self) -> PathBuf {
        match self {
            Environment::Production => env::temp_dir().join(PROD_STAGING_DIRNAME),
            Environment::Development => env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(DEV_STAGING_SUBDIR),
        }
    }
}

/// Where uploads and converted outputs live, and how long outputs are kept.
///
/// Passed explicitly to every component that touches the staging area so
/// tests can hand each run its own directory.
#[derive(Debug, Clone)]
pub struct StagingConfig {
    /// Directory holding staged uploads and converted outputs
    pub dir: PathBuf,

    /// How long a converted (or served) output stays downloadable (default: 1 hour)
    pub retention: Duration,

    /// How often the sweeper scans the staging directory (default: 1 hour)
    pub sweep_interval: Duration,

    /// Files older than this that nothing owns are swept (default: 24 hours)
    pub orphan_age: Duration,
}

impl StagingConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            retention: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            orphan_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Artificial processing delays of the stub converters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionDelays {
    pub document: Duration,
    pub image: Duration,
    pub audio_video: Duration,
}

impl Default for ConversionDelays {
    fn default() -> Self {
        Self {
            document: Duration::from_millis(1500),
            image: Duration::from_millis(1000),
            audio_video: Duration::from_millis(3000),
        }
    }
}

impl ConversionDelays {
    pub fn none() -> Self {
        Self {
            document: Duration::ZERO,
            image: Duration::ZERO,
            audio_video: Duration::ZERO,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,

    pub staging: StagingConfig,

    pub delays: ConversionDelays,

    /// Maximum upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Mount the diagnostic `/api/test-upload` route
    pub enable_test_upload: bool,

    /// Allowed CORS origins; `*` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let environment = Environment::Development;
        Self {
            environment,
            staging: StagingConfig::new(environment.default_staging_dir()),
            delays: ConversionDelays::default(),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            enable_test_upload: true,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn hours(h: u64) -> Duration {
    Duration::from_secs(h.saturating_mul(60 * 60))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let environment = Environment::from_env();
        let default = match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        };

        let staging_dir = env::var("STAGING_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(default.staging.dir);

        let staging = StagingConfig {
            dir: staging_dir,
            retention: env_parse("RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.staging.retention),
            sweep_interval: env_parse("STAGING_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.staging.sweep_interval),
            orphan_age: env_parse::<u64>("STAGING_CLEANUP_AGE_HOURS")
                .map(hours)
                .unwrap_or(default.staging.orphan_age),
        };

        let delays = ConversionDelays {
            document: env_parse("DOCUMENT_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.delays.document),
            image: env_parse("IMAGE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.delays.image),
            audio_video: env_parse("AUDIO_VIDEO_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.delays.audio_video),
        };

        Self {
            environment,
            staging,
            delays,
            max_file_size: env_parse("MAX_FILE_SIZE").unwrap_or(default.max_file_size),
            enable_test_upload: env::var("ENABLE_TEST_UPLOAD")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.enable_test_upload),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Development: staging under the working directory, diagnostics on
    pub fn development() -> Self {
        Self::default()
    }

    /// Production: staging in the OS temp dir, diagnostics off
    pub fn production() -> Self {
        let environment = Environment::Production;
        Self {
            environment,
            staging: StagingConfig::new(environment.default_staging_dir()),
            enable_test_upload: false,
            ..Self::default()
        }
    }

    /// Isolated configuration rooted at `dir` with no conversion delays
    pub fn for_staging_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            staging: StagingConfig::new(dir),
            delays: ConversionDelays::none(),
            allowed_origins: vec!["*".to_string()],
            ..Self::default()
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}
