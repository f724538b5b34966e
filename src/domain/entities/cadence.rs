/// Longest renewal period accepted from a storefront cadence label.
pub const MAX_SUBSCRIPTION_DAYS: i32 = 366;

/// Extract the renewal period from a storefront option label such as
/// "Deliver every 30 days". The first run of digits is the period.
pub fn parse_cadence_days(label: &str) -> Option<i32> {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let days: i32 = digits.parse().ok()?;
    (1..=MAX_SUBSCRIPTION_DAYS).contains(&days).then_some(days)
}
