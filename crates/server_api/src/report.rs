use chrono::NaiveDate;
use shared::{
    domain::{Courier, CourierId, Order, OrderStatus},
    protocol::{CourierReportLine, DailyReport},
};

/// Flat payment owed to a courier for each delivered order.
pub const DELIVERY_RATE: u64 = 500;

pub fn delivered_count(courier_id: CourierId, orders: &[Order]) -> u64 {
    orders
        .iter()
        .filter(|order| order.is_delivered_by(courier_id))
        .count() as u64
}

/// Earnings for `courier_id`; zero when the courier is not on the roster.
pub fn earnings_for(courier_id: CourierId, couriers: &[Courier], orders: &[Order]) -> u64 {
    if !couriers.iter().any(|courier| courier.id == courier_id) {
        return 0;
    }
    delivered_count(courier_id, orders) * DELIVERY_RATE
}

pub fn build_daily_report(couriers: &[Courier], orders: &[Order], date: NaiveDate) -> DailyReport {
    let lines_per_courier: Vec<CourierReportLine> = couriers
        .iter()
        .map(|courier| {
            let delivered = delivered_count(courier.id, orders);
            CourierReportLine {
                courier_id: courier.id,
                name: courier.name.clone(),
                delivered,
                earnings: delivered * DELIVERY_RATE,
            }
        })
        .collect();

    let total_delivered = orders
        .iter()
        .filter(|order| order.status == OrderStatus::Delivered)
        .count() as u64;
    let total_earnings: u64 = lines_per_courier.iter().map(|line| line.earnings).sum();
    let average_delivered_per_courier = if lines_per_courier.is_empty() {
        0.0
    } else {
        let delivered_by_couriers: u64 = lines_per_courier.iter().map(|line| line.delivered).sum();
        delivered_by_couriers as f64 / lines_per_courier.len() as f64
    };

    let mut lines: Vec<String> = lines_per_courier
        .iter()
        .map(|line| {
            format!(
                "Courier: {}, Deliveries: {}, Earnings: ${}",
                line.name, line.delivered, line.earnings
            )
        })
        .collect();
    lines.push(format!("Total deliveries: {total_delivered}"));
    lines.push(format!("Total earned by all couriers: ${total_earnings}"));
    lines.push(format!(
        "Average deliveries per courier: {average_delivered_per_courier:.2}"
    ));

    DailyReport {
        date,
        couriers: lines_per_courier,
        total_delivered,
        total_earnings,
        average_delivered_per_courier,
        lines,
    }
}

#[cfg(test)]
#[path = "tests/report_tests.rs"]
mod tests;
