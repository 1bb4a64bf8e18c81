use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Client, CourierId, Order};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default, alias = "observaciones")]
    pub observations: String,
    #[serde(default, alias = "cliente")]
    pub client: Option<Client>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCourierRequest {
    #[serde(default)]
    pub id: Option<CourierId>,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "direccion")]
    pub address: String,
    #[serde(default, alias = "telefono")]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfirmation {
    pub message: String,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierEarnings {
    pub courier_id: CourierId,
    pub earnings: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierReportLine {
    pub courier_id: CourierId,
    pub name: String,
    pub delivered: u64,
    pub earnings: u64,
}

/// End-of-day figures, both structured and as display lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub couriers: Vec<CourierReportLine>,
    pub total_delivered: u64,
    pub total_earnings: u64,
    pub average_delivered_per_courier: f64,
    pub lines: Vec<String>,
}
