pub mod business_days;
pub mod due_dates;
