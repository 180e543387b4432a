pub const APP_NAME: &str = env!("APP_NAME");
pub const APP_VERSION: &str = env!("APP_VERSION");
pub const APP_ID: &str = env!("APP_ID");

pub const USER_DATA_FILE: &str = "user_data.yml";
pub const CONFIG_FILE: &str = "config.json";
