//! Pure selectors folding the event log into point-in-time views.
//!
//! Every function here takes a slice of events plus filters and never
//! fails; missing data yields zero or empty views.

pub mod cockpit;
pub mod delivery;
pub mod labor;
pub mod prep;
pub mod sales;
pub mod staff;
pub mod todos;

pub use cockpit::{CockpitMetrics, IncidentCounts};
pub use delivery::{DeliveryView, latest_deliveries};
pub use labor::{LaborMetrics, labor_metrics};
pub use prep::{PrepMetrics, prep_metrics};
pub use sales::{
    CalendarDay, MonthlyForecastSummary, MonthlySalesMetrics, SalesLedger, SalesMetrics,
    YearMonth, calendar_data, monthly_forecast_summary, monthly_sales_metrics,
};
pub use staff::{StaffState, StaffStatus, derive_staff_states, derive_staff_status};
pub use todos::{TodoIndex, TodoStats, TodoView};
