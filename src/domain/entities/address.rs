use serde::{Deserialize, Serialize};

/// Address captured on a subscription or read from a commerce order.
///
/// Every field is optional: snapshots come from orders that may be partially
/// filled. Blank strings are treated the same as missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub street_1: Option<String>,
    pub street_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub country_iso2: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Fully resolved address used in an order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAddress {
    pub first_name: String,
    pub last_name: String,
    pub street_1: String,
    pub street_2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub country_iso2: String,
    pub phone: String,
    pub email: String,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn pick(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    present(primary)
        .or_else(|| present(fallback))
        .map(str::to_string)
}

impl AddressSnapshot {
    /// Field-by-field merge where values on `self` win over `fallback`.
    pub fn or(&self, fallback: &AddressSnapshot) -> AddressSnapshot {
        AddressSnapshot {
            first_name: pick(&self.first_name, &fallback.first_name),
            last_name: pick(&self.last_name, &fallback.last_name),
            street_1: pick(&self.street_1, &fallback.street_1),
            street_2: pick(&self.street_2, &fallback.street_2),
            city: pick(&self.city, &fallback.city),
            state: pick(&self.state, &fallback.state),
            zip: pick(&self.zip, &fallback.zip),
            country: pick(&self.country, &fallback.country),
            country_iso2: pick(&self.country_iso2, &fallback.country_iso2),
            phone: pick(&self.phone, &fallback.phone),
            email: pick(&self.email, &fallback.email),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == AddressSnapshot::default()
    }

    /// Validate the snapshot into an order address.
    ///
    /// Returns the names of the required fields that are missing.
    /// `street_2`, `state` and `phone` may be blank.
    pub fn to_order_address(&self) -> Result<OrderAddress, Vec<&'static str>> {
        let mut missing = Vec::new();
        let mut required = |name: &'static str, value: &Option<String>| -> String {
            match present(value) {
                Some(v) => v.to_string(),
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let address = OrderAddress {
            first_name: required("first_name", &self.first_name),
            last_name: required("last_name", &self.last_name),
            street_1: required("street_1", &self.street_1),
            city: required("city", &self.city),
            zip: required("zip", &self.zip),
            country: required("country", &self.country),
            country_iso2: required("country_iso2", &self.country_iso2),
            email: required("email", &self.email),
            street_2: present(&self.street_2).unwrap_or_default().to_string(),
            state: present(&self.state).unwrap_or_default().to_string(),
            phone: present(&self.phone).unwrap_or_default().to_string(),
        };

        if missing.is_empty() {
            Ok(address)
        } else {
            Err(missing)
        }
    }
}
