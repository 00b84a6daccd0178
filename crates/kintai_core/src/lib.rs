pub mod domain;
pub mod ports;
pub mod time_rules;

pub use domain::{
    AttendanceRecord, MonthlyTotals, Session, UserCredentials, ATTENDANCE_FIELDS,
};
pub use ports::{
    AttendanceStore, AuthStore, HolidayCalendar, PortError, PortResult, StorageBackend,
};
