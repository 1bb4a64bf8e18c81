use std::fmt;

use serde::{
    de::{self, Unexpected, Visitor},
    Deserialize, Deserializer, Serialize,
};

pub const DEFAULT_BUSINESS_NAME: &str = "Cadetería Sin Datos";
pub const DEFAULT_BUSINESS_PHONE: &str = "000-0000";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl $name {
            /// Next identifier after the highest one yielded by `ids`, or 1 when empty.
            /// `None` once the highest identifier is `i64::MAX`.
            pub fn next_after(ids: impl IntoIterator<Item = Self>) -> Option<Self> {
                let highest = ids.into_iter().map(|id| id.0).max().unwrap_or(0);
                highest.checked_add(1).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(CourierId);
id_newtype!(OrderNumber);

/// Lifecycle of an order. `Delivered` is terminal.
///
/// Written as a snake_case name. On input it also takes the English or Spanish
/// name in any case, and the numeric codes 0 to 3 that older deployments
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Assigned,
    EnRoute,
    Delivered,
}

const STATUS_NAMES: &[&str] = &["pending", "assigned", "en_route", "delivered"];

impl OrderStatus {
    fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Assigned),
            2 => Some(Self::EnRoute),
            3 => Some(Self::Delivered),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => Some(Self::Pending),
            "assigned" | "asignado" => Some(Self::Assigned),
            "en_route" | "enroute" | "enviado" => Some(Self::EnRoute),
            "delivered" | "entregado" => Some(Self::Delivered),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Assigned => 1,
            Self::EnRoute => 2,
            Self::Delivered => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Delivered
    }

    /// True when moving from `previous` to `self` follows the lifecycle order.
    pub fn is_forward_of(self, previous: Self) -> bool {
        self.rank() >= previous.rank()
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StatusVisitor)
    }
}

struct StatusVisitor;

impl Visitor<'_> for StatusVisitor {
    type Value = OrderStatus;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an order status name or a status code from 0 to 3")
    }

    fn visit_u64<E: de::Error>(self, code: u64) -> Result<Self::Value, E> {
        OrderStatus::from_code(code)
            .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(code), &self))
    }

    fn visit_i64<E: de::Error>(self, code: i64) -> Result<Self::Value, E> {
        match u64::try_from(code) {
            Ok(code) => self.visit_u64(code),
            Err(_) => Err(E::invalid_value(Unexpected::Signed(code), &self)),
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        if let Ok(code) = value.trim().parse::<u64>() {
            return self.visit_u64(code);
        }
        OrderStatus::from_name(value).ok_or_else(|| E::unknown_variant(value, STATUS_NAMES))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Assigned => "Assigned",
            Self::EnRoute => "EnRoute",
            Self::Delivered => "Delivered",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "direccion")]
    pub address: String,
    #[serde(alias = "telefono")]
    pub phone: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        alias = "addressreference",
        alias = "datosreferenciadireccion"
    )]
    pub address_reference: Option<String>,
}

impl Client {
    pub fn full_address(&self) -> String {
        match self.address_reference.as_deref() {
            Some(reference) if !reference.is_empty() => format!("{} ({reference})", self.address),
            _ => self.address.clone(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Name: {}, Phone: {}, Address: {}",
            self.name,
            self.phone,
            self.full_address()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Courier {
    pub id: CourierId,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "direccion")]
    pub address: String,
    #[serde(default, alias = "telefono")]
    pub phone: String,
}

impl fmt::Display for Courier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, Name: {}, Address: {}, Phone: {}",
            self.id, self.name, self.address, self.phone
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(alias = "numero")]
    pub number: OrderNumber,
    #[serde(default, alias = "observaciones")]
    pub observations: String,
    #[serde(default, alias = "cliente")]
    pub client: Client,
    #[serde(default, alias = "courierid", alias = "idcadete")]
    pub courier_id: Option<CourierId>,
    #[serde(default, alias = "estado")]
    pub status: OrderStatus,
}

impl Order {
    pub fn new(number: OrderNumber, observations: impl Into<String>, client: Client) -> Self {
        Self {
            number,
            observations: observations.into(),
            client,
            courier_id: None,
            status: OrderStatus::Pending,
        }
    }

    /// Structural duplicate check: observations plus every client field.
    pub fn is_duplicate_of(&self, observations: &str, client: &Client) -> bool {
        self.observations == observations && self.client == *client
    }

    pub fn is_delivered_by(&self, courier_id: CourierId) -> bool {
        self.courier_id == Some(courier_id) && self.status == OrderStatus::Delivered
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let courier = match self.courier_id {
            Some(id) => format!("Courier ID {id}"),
            None => "unassigned".to_string(),
        };
        write!(
            f,
            "Order #{}, Status: {}, Courier: {courier}, Client: {}",
            self.number, self.status, self.client.name
        )
    }
}

/// Business header plus a denormalized copy of both collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "telefono")]
    pub phone: String,
    #[serde(default, alias = "cadetes")]
    pub couriers: Vec<Courier>,
    #[serde(default, alias = "pedidos")]
    pub orders: Vec<Order>,
}

impl Default for Business {
    fn default() -> Self {
        Self {
            name: DEFAULT_BUSINESS_NAME.into(),
            phone: DEFAULT_BUSINESS_PHONE.into(),
            couriers: Vec::new(),
            orders: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
