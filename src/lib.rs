pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod research;
pub mod schemas;
pub mod server;
pub mod utils;

// Load env from a simple, standardized location resolution.
// RESEARCH_ENV_FILE wins; otherwise dotenvy::dotenv() loads .env if present and
// silently ignores it if missing.
pub fn load_env() {
    match std::env::var("RESEARCH_ENV_FILE") {
        Ok(path) => {
            let _ = dotenvy::from_path(path);
        }
        Err(_) => {
            let _ = dotenvy::dotenv();
        }
    }
}
