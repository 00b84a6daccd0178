//! services/api/src/report.rs
//!
//! Renders one user's one-month attendance mapping into the fixed-layout
//! work-hours report (作業時間報告書): a two-block page with days 1-16 on
//! the left, day 17 onward on the right, per-day worked hours, and month
//! totals in fixed summary cells. Deterministic formatting over at most 31
//! days; the workbook is produced in memory and served as a download.

use chrono::Datelike;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatPattern, Workbook, XlsxError};
use std::collections::BTreeMap;

use kintai_core::domain::AttendanceRecord;
use kintai_core::ports::HolidayCalendar;
use kintai_core::time_rules::{
    is_weekend, month_days, monthly_totals, wareki_label, weekday_jp, worked_minutes,
};

const SHEET_NAME: &str = "template";
const DAY_HEADERS: [&str; 9] = [
    "日付", "曜日", "出勤時間", "退勤時間", "実働時間", "交通費", "出発駅", "目的駅", "備考",
];
/// Left block starts at column B, right block at column L (0-indexed).
const LEFT_COL: u16 = 1;
const RIGHT_COL: u16 = 11;
/// First data row (0-indexed); headers sit one row above.
const HEADER_ROW: u32 = 12;
const COL_WIDTHS: [f64; 21] = [
    5.0, 10.0, 12.0, 14.0, 14.0, 14.0, 10.0, 14.0, 14.0, 18.0, 4.0, 10.0, 12.0, 14.0, 14.0,
    14.0, 10.0, 14.0, 14.0, 18.0, 4.0,
];

/// The download filename; the display name falls back to 氏名未入力 the way
/// the report header does.
pub fn report_filename(year: i32, month: u32, display_name: &str) -> String {
    let name = if display_name.is_empty() {
        "氏名未入力"
    } else {
        display_name
    };
    format!("作業時間報告書_{year}年{month}月_{name}.xlsx")
}

struct ReportFormats {
    title: Format,
    header: Format,
    normal: Format,
    cell: Format,
    cell_left: Format,
    red_cell: Format,
    header_cell: Format,
    summary: Format,
    notes_box: Format,
}

impl ReportFormats {
    fn new() -> Self {
        let base = || Format::new().set_font_name("MS Gothic");
        let banded = |f: Format| {
            f.set_background_color(Color::RGB(0xCCFFCC))
                .set_pattern(FormatPattern::Solid)
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
        };
        Self {
            title: base()
                .set_font_size(16)
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            header: base()
                .set_font_size(10)
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            normal: base().set_font_size(9),
            cell: banded(base().set_font_size(9)),
            cell_left: banded(base().set_font_size(9)).set_align(FormatAlign::Left),
            red_cell: banded(
                base()
                    .set_font_size(9)
                    .set_bold()
                    .set_font_color(Color::RGB(0xFF0000)),
            ),
            header_cell: base()
                .set_font_size(10)
                .set_bold()
                .set_background_color(Color::RGB(0x99FF99))
                .set_pattern(FormatPattern::Solid)
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            summary: base()
                .set_font_size(9)
                .set_bold()
                .set_background_color(Color::RGB(0x99FF99))
                .set_pattern(FormatPattern::Solid)
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            notes_box: base()
                .set_font_size(10)
                .set_bold()
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::Top)
                .set_border(FormatBorder::Thin),
        }
    }
}

/// Renders the report workbook for `(year, month)` and returns the xlsx
/// bytes. A month with no attendance still yields blank daily rows for every
/// calendar day and zero totals.
pub fn monthly_report(
    year: i32,
    month: u32,
    attendance: &BTreeMap<String, AttendanceRecord>,
    display_name: &str,
    holidays: &dyn HolidayCalendar,
) -> Result<Vec<u8>, XlsxError> {
    let days = month_days(year, month).unwrap_or_default();
    let formats = ReportFormats::new();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, width) in COL_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }
    for row in 0..60 {
        worksheet.set_row_height(row, 22)?;
    }
    worksheet.set_row_height(1, 32)?;

    // Title and year/month banner.
    worksheet.merge_range(1, 1, 1, 19, "作業時間報告書", &formats.title)?;
    worksheet.write_with_format(3, 1, wareki_label(year, month), &formats.header)?;
    worksheet.write_with_format(3, 2, year.to_string(), &formats.header)?;
    worksheet.write_with_format(3, 3, "年", &formats.header)?;
    worksheet.write_with_format(3, 4, month.to_string(), &formats.header)?;
    worksheet.write_with_format(3, 5, "月度", &formats.header)?;

    // Company / name banner. The client and company cells stay blank for the
    // submitter to fill in; only the name is known here.
    worksheet.write_with_format(6, 1, "対応客先名", &formats.header)?;
    worksheet.write_with_format(6, 5, "会社名", &formats.header)?;
    worksheet.write_with_format(6, 8, "氏名", &formats.header)?;
    let name = if display_name.is_empty() {
        "氏名未入力"
    } else {
        display_name
    };
    worksheet.write_with_format(6, 9, name, &formats.normal)?;

    for (i, header) in DAY_HEADERS.iter().enumerate() {
        worksheet.write_with_format(HEADER_ROW, LEFT_COL + i as u16, *header, &formats.header_cell)?;
        worksheet.write_with_format(HEADER_ROW, RIGHT_COL + i as u16, *header, &formats.header_cell)?;
    }

    let split = days.len().min(16);
    let (left_days, right_days) = days.split_at(split);
    for (idx, day) in left_days.iter().enumerate() {
        let row = HEADER_ROW + 1 + idx as u32;
        write_day_row(worksheet, row, LEFT_COL, *day, attendance, holidays, &formats)?;
    }
    for (idx, day) in right_days.iter().enumerate() {
        let row = HEADER_ROW + 1 + idx as u32;
        write_day_row(worksheet, row, RIGHT_COL, *day, attendance, holidays, &formats)?;
    }

    // Month totals, computed over this month's records only.
    let totals = monthly_totals(attendance.values());
    let sum_row = HEADER_ROW + 1 + left_days.len().max(right_days.len()) as u32;
    worksheet.write_with_format(sum_row, 14, "計", &formats.summary)?;
    worksheet.write_with_format(
        sum_row,
        15,
        format!("{:.2}", totals.worked_hours()),
        &formats.summary,
    )?;
    worksheet.write_with_format(sum_row, 17, "交通費合計", &formats.summary)?;
    worksheet.write_with_format(
        sum_row,
        18,
        format!("{:.0}", totals.travel_cost),
        &formats.summary,
    )?;

    // Free-form notes box and the from/to footer.
    let notes_row = sum_row + 2;
    worksheet.merge_range(notes_row, 1, notes_row + 7, 7, "備考", &formats.notes_box)?;

    worksheet.write_with_format(notes_row, 12, "実働時間合計", &formats.header)?;
    worksheet.write_with_format(
        notes_row,
        13,
        format!("{:.2} h", totals.worked_hours()),
        &formats.normal,
    )?;
    worksheet.write_with_format(notes_row + 2, 12, "自", &formats.normal)?;
    worksheet.write_with_format(
        notes_row + 2,
        13,
        format!("{year}年{month}月1日"),
        &formats.normal,
    )?;
    if let Some(last) = days.last() {
        worksheet.write_with_format(notes_row + 3, 12, "至", &formats.normal)?;
        worksheet.write_with_format(
            notes_row + 3,
            13,
            format!("{year}年{month}月{}日", last.day()),
            &formats.normal,
        )?;
    }

    workbook.save_to_buffer()
}

fn write_day_row(
    worksheet: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    base_col: u16,
    day: chrono::NaiveDate,
    attendance: &BTreeMap<String, AttendanceRecord>,
    holidays: &dyn HolidayCalendar,
    formats: &ReportFormats,
) -> Result<(), XlsxError> {
    let date_str = day.format("%Y-%m-%d").to_string();
    let record = attendance.get(&date_str).cloned().unwrap_or_default();

    let worked = worked_minutes(&record)
        .map(|minutes| format!("{:.2}", minutes as f64 / 60.0))
        .unwrap_or_default();

    let weekday_format = if is_weekend(day) || holidays.is_holiday(day) {
        &formats.red_cell
    } else {
        &formats.cell
    };

    worksheet.write_with_format(row, base_col, day.day() as f64, &formats.cell)?;
    worksheet.write_with_format(row, base_col + 1, weekday_jp(day), weekday_format)?;
    worksheet.write_with_format(
        row,
        base_col + 2,
        record.check_in.as_deref().unwrap_or(""),
        &formats.cell,
    )?;
    worksheet.write_with_format(
        row,
        base_col + 3,
        record.check_out.as_deref().unwrap_or(""),
        &formats.cell,
    )?;
    worksheet.write_with_format(row, base_col + 4, worked, &formats.cell)?;
    worksheet.write_with_format(
        row,
        base_col + 5,
        record.travel_cost.as_deref().unwrap_or(""),
        &formats.cell,
    )?;
    worksheet.write_with_format(
        row,
        base_col + 6,
        record.travel_from.as_deref().unwrap_or(""),
        &formats.cell,
    )?;
    worksheet.write_with_format(
        row,
        base_col + 7,
        record.travel_to.as_deref().unwrap_or(""),
        &formats.cell,
    )?;
    // Notes are the one left-aligned column.
    worksheet.write_with_format(
        row,
        base_col + 8,
        record.notes.as_deref().unwrap_or(""),
        &formats.cell_left,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FileHolidayCalendar;

    fn is_xlsx(bytes: &[u8]) -> bool {
        // xlsx files are zip archives.
        bytes.starts_with(b"PK\x03\x04")
    }

    #[test]
    fn empty_month_still_produces_a_valid_workbook() {
        let calendar = FileHolidayCalendar::weekend_only();
        let bytes = monthly_report(2025, 7, &BTreeMap::new(), "山田", &calendar).unwrap();
        assert!(is_xlsx(&bytes));
    }

    #[test]
    fn populated_month_renders() {
        let calendar = FileHolidayCalendar::weekend_only();
        let mut attendance = BTreeMap::new();
        let mut record = AttendanceRecord::default();
        record.check_in = Some("09:00".into());
        record.check_out = Some("18:00".into());
        record.travel_cost = Some("540".into());
        record.notes = Some("客先訪問".into());
        attendance.insert("2025-02-28".to_string(), record);

        let bytes = monthly_report(2025, 2, &attendance, "山田", &calendar).unwrap();
        assert!(is_xlsx(&bytes));
    }

    #[test]
    fn filename_embeds_year_month_and_name() {
        assert_eq!(
            report_filename(2025, 7, "山田"),
            "作業時間報告書_2025年7月_山田.xlsx"
        );
        assert_eq!(
            report_filename(2025, 7, ""),
            "作業時間報告書_2025年7月_氏名未入力.xlsx"
        );
    }
}
