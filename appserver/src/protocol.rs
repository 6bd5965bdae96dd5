//! Pipe-delimited command protocol (SPEC_FULL.md §6.3).
//!
//! Only `BUY` and `GET_TX_STATUS` are implemented by this core; every other
//! command name is a recognized extension point for the excluded marketplace
//! server and is rejected with `ERR|UNKNOWN_COMMAND|...`.

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Buy {
        asset_id: String,
        username: String,
        amount: f64,
    },
    GetTxStatus {
        tx_id: String,
    },
    Unknown(String),
}

pub fn parse(line: &str) -> Command {
    let parts: Vec<&str> = line.trim().split('|').collect();
    match parts.as_slice() {
        ["BUY", asset_id, username, amount] => match amount.parse::<f64>() {
            Ok(amount) => Command::Buy {
                asset_id: asset_id.to_string(),
                username: username.to_string(),
                amount,
            },
            Err(_) => Command::Unknown(line.to_string()),
        },
        ["GET_TX_STATUS", tx_id] => Command::GetTxStatus {
            tx_id: tx_id.to_string(),
        },
        _ => Command::Unknown(line.to_string()),
    }
}

pub fn err_reply(code: &str, message: &str) -> String {
    format!("ERR|{code}|{message}")
}

pub fn ok_pending(tx_id: &str) -> String {
    format!("OK|PENDING|{tx_id}")
}

pub fn ok_status(status: &str, message: &str) -> String {
    format!("OK|{status}|{message}")
}
