/// Column-name constants for the PSP tracker tables.
/// Single source of truth - exported to Python via PyO3.

// ── Canonical columns ───────────────────────────────────────────────────────
pub mod canonical {
    pub const COUNTRY: &str = "country";
    pub const PSP: &str = "psp";
    pub const WEEK: &str = "week";
    pub const PRESS_BUY: &str = "press_buy";
    pub const CONVERTED: &str = "converted";
    pub const PAYMENT_OPTION: &str = "payment_option";

    /// Text columns that identify a row.
    pub const LABELS: [&str; 3] = [COUNTRY, PSP, WEEK];

    /// Count columns coerced to non-negative floats.
    pub const COUNTS: [&str; 2] = [PRESS_BUY, CONVERTED];
}

// ── Derived metric columns ──────────────────────────────────────────────────
pub mod derived {
    pub const CONVERSION_RATE: &str = "conversion_rate";
    pub const PRESS_BUY_SHARE: &str = "press_buy_share";
    pub const CONVERTED_SHARE: &str = "converted_share";

    pub const ALL: [&str; 3] = [CONVERSION_RATE, PRESS_BUY_SHARE, CONVERTED_SHARE];
}

// ── Value formats ───────────────────────────────────────────────────────────
pub mod format {
    pub const NUMBER: &str = "number";
    pub const PERCENTAGE: &str = "percentage";
}

// ── Chart kinds ─────────────────────────────────────────────────────────────
pub mod chart_kind {
    pub const LINE: &str = "line";
    pub const BAR: &str = "bar";
}
