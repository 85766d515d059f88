//! 告警 key 与预加载模板

use hpl_host::{Alert, AlertTemplate};

pub const CONNECTIVITY: &str = "connectivity-alert";
pub const NUMERIC_ID_MISSING: &str = "numeric-id-missing-alert";
pub const DV_REQUIRES_CEID: &str = "DV-requires-CEID-alert";
pub const FAILED_TO_GET_DATA: &str = "failed-to-get-data-alert";
pub const BAD_STATUS_RESPONSE: &str = "bad-status-response-alert";
pub const BAD_CONSTANT_RESPONSE: &str = "bad-constant-response-alert";
pub const BAD_ALARM_REPORT: &str = "bad-alarm-report-alert";
pub const NO_RESPONSE: &str = "no-response-alert";
pub const WRITE_FAILED: &str = "write-failed-alert";
pub const DATABASE_ERROR: &str = "database-error";

/// 构造时预加载的模板
pub fn templates(machine: &str) -> Vec<AlertTemplate> {
    vec![
        AlertTemplate::new(
            CONNECTIVITY,
            format!("{machine}: Connection Error"),
            "Unable to open connection. please verify the connection configuration",
        ),
        AlertTemplate::new(
            NUMERIC_ID_MISSING,
            format!("{machine}: All status variables and equipment constants require a numericID"),
            "No numericID is defined for variable {error}",
        ),
        AlertTemplate::new(
            DV_REQUIRES_CEID,
            format!("{machine}: Data variables (DV) require Collection Event (CEID)"),
            "CEID required for variable {error}",
        ),
        AlertTemplate::new(
            FAILED_TO_GET_DATA,
            format!("{machine}: Failed to Get Variable Data"),
            "Failed to get the data for variable {error}",
        ),
        AlertTemplate::new(
            BAD_STATUS_RESPONSE,
            format!("{machine}: Bad Status Variable Response"),
            "A failed-transaction response was received to a status variable request",
        ),
        AlertTemplate::new(
            BAD_CONSTANT_RESPONSE,
            format!("{machine}: Bad Equipment Constant Response"),
            "A failed-transaction response was received to an equipment constant request",
        ),
        AlertTemplate::new(
            BAD_ALARM_REPORT,
            format!("{machine}: Bad Alarm Report"),
            "A bad alarm report was received",
        ),
        AlertTemplate::new(
            NO_RESPONSE,
            format!("{machine}: No Response from Equipment"),
            "No response was received from the equipment after a data request",
        ),
        AlertTemplate::new(
            WRITE_FAILED,
            format!("{machine}: Equipment Constant Write Failed"),
            "Writing to an equipment constant failed",
        ),
        AlertTemplate::new(
            DATABASE_ERROR,
            format!("{machine}: Error Writing to Database"),
            "An error occurred writing a variable value to the database. Error: {error}",
        ),
    ]
}

pub fn not_writable_key(variable: &str) -> String {
    format!("variable-not-writable-error-{variable}")
}

pub fn not_equipment_constant_key(variable: &str) -> String {
    format!("not-eqipment-constant-error-{variable}")
}

pub fn no_numeric_id_key(variable: &str) -> String {
    format!("no-numeric-id-error-{variable}")
}

pub fn not_writable(machine: &str, variable: &str) -> Alert {
    Alert::new(not_writable_key(variable)).with_text(
        format!("{machine}: Error Writing Variable"),
        format!("Error writing {variable}. Variable does not exist or is not writable"),
    )
}

pub fn not_equipment_constant(machine: &str, variable: &str) -> Alert {
    Alert::new(not_equipment_constant_key(variable)).with_text(
        format!("{machine}: Variable Is Not an Equipment Constant"),
        format!("Error writing {variable}. Only equipment constants may be written"),
    )
}

pub fn no_numeric_id(machine: &str, variable: &str) -> Alert {
    Alert::new(no_numeric_id_key(variable)).with_text(
        format!("{machine}: Variable Has No Numeric ID"),
        format!("Error writing {variable}. Variable does not have a numeric ID"),
    )
}
