use chrono::{Local, NaiveDate};

/// Derives local usernames from WeChat open ids
///
/// `<last 8 chars of the open id, left-padded with '0'>_<YYYYMMDD>`. The
/// same open id on the same day always yields the same name; collisions are
/// left to the username unique constraint.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsernameMaterializer {
    fixed_date: Option<NaiveDate>,
}

impl UsernameMaterializer {
    /// Uses the server's local date
    #[must_use]
    pub const fn system() -> Self {
        Self { fixed_date: None }
    }

    /// Pins the date component
    #[must_use]
    pub const fn fixed(date: NaiveDate) -> Self {
        Self {
            fixed_date: Some(date),
        }
    }

    #[must_use]
    pub fn materialize(&self, open_id: &str) -> String {
        let date = self.fixed_date.unwrap_or_else(|| Local::now().date_naive());
        let chars: Vec<char> = open_id.chars().collect();
        let suffix: String = chars[chars.len().saturating_sub(8)..].iter().collect();
        format!("{suffix:0>8}_{}", date.format("%Y%m%d"))
    }
}
