const PODMON_CONFIG: &str = "PODMON_CONFIG";

const DEFAULT_CONFIG: &str = "./podmon.json";

pub fn get_default_config_path() -> String {
    String::from(DEFAULT_CONFIG)
}

pub fn get_config_path() -> String {
    std::env::var(PODMON_CONFIG).unwrap_or_else(|_| get_default_config_path())
}

const PODMON_WORKERS: &str = "PODMON_WORKERS";

/// Worker count override from the environment, if set and valid
pub fn get_workers() -> Option<usize> {
    let workers_from_env = std::env::var(PODMON_WORKERS);
    workers_from_env
        .ok()
        .and_then(|res| res.parse().ok())
        .filter(|workers| *workers > 0)
}
