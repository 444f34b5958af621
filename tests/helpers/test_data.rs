//! Sample identifiers and documents

use serde_json::{json, Value};
use QueueBuddy::models::EnqueueRequest;

pub const G1: i64 = -1001;
pub const G2: i64 = -1002;

pub const DEV: i64 = 500;
pub const ADMIN: i64 = 600;

pub fn request(user_id: i64, full_name: &str) -> EnqueueRequest {
    EnqueueRequest::new(user_id, format!("user{}", user_id), full_name)
}

pub fn entry_json(user_id: i64, full_name: &str, position: usize) -> Value {
    json!({
        "user_id": user_id,
        "username": format!("user{}", user_id),
        "full_name": full_name,
        "registered_at": "2024-09-04T20:00:05+03:00",
        "position": position
    })
}

/// Configuration document written before groups existed
pub fn legacy_config() -> Value {
    json!({
        "courses": {
            "oop_lab": "ООП Лаб",
            "Math": {"name": "Math", "schedule": {"day": 1, "time": "09:00"}}
        },
        "dev_users": [DEV],
        "blacklist": [13]
    })
}

/// Runtime document written before groups existed
pub fn legacy_runtime() -> Value {
    json!({
        "queues": {
            "math": [entry_json(1, "Alice", 1), entry_json(2, "Bob", 5)],
            "history": [entry_json(3, "Carol", 1)]
        },
        "registration_open": true
    })
}

/// Current-format configuration with one group and one course
pub fn current_config() -> Value {
    json!({
        "groups": {
            G1.to_string(): {
                "name": "G1",
                "created_at": "2024-09-01T10:00:00+03:00",
                "courses": {"math": {"name": "Math", "schedule": {"day": 2, "time": "20:00"}}}
            }
        },
        "dev_users": [],
        "group_admins": {G1.to_string(): [ADMIN]},
        "max_queue_size": 50,
        "group_queue_sizes": {},
        "blacklist": []
    })
}
