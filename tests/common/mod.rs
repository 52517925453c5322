#![allow(dead_code)]

use std::sync::Arc;

use tradejournal::adapters::sqlite_adapter::SqliteAdapter;
use tradejournal::ports::config_port::ConfigPort;

pub const SAMPLE_CSV: &str = "\
B/S,avgPrice,filledQty,Fill Time,Date
Buy,5000.25,2,09:30:00,2024-07-15
Sell,5010.25,2,09:45:00,2024-07-15
Sell,5020.00,1,10:15:00,2024-07-15
Buy,5015.00,1,10:30:00,2024-07-15
";

pub struct MockConfigPort;

impl ConfigPort for MockConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match (section, key) {
            ("server", "listen") => Some("127.0.0.1:0".to_string()),
            _ => None,
        }
    }

    fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
        default
    }

    fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
        default
    }

    fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
        default
    }
}

pub fn test_journal() -> Arc<SqliteAdapter> {
    let journal = SqliteAdapter::in_memory().expect("in-memory adapter");
    journal.initialize_schema().expect("schema");
    Arc::new(journal)
}
