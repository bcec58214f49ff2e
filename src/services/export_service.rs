use crate::error::Result;
use crate::models::question::Question;
use crate::models::student::Student;
use crate::services::question_service::IMPORT_COLUMNS;
use rust_xlsxwriter::*;

pub struct ExportService;

struct Palette {
    primary: Color,
    header_bg: Color,
    header_text: Color,
    alt_row_1: Color,
    alt_row_2: Color,
    border: Color,
}

const PALETTE: Palette = Palette {
    primary: Color::RGB(0x111933), // portal navy
    header_bg: Color::RGB(0x1E293B),
    header_text: Color::White,
    alt_row_1: Color::RGB(0xF8FAFC),
    alt_row_2: Color::White,
    border: Color::RGB(0xE2E8F0),
};

impl ExportService {
    fn title_format() -> Format {
        Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(PALETTE.header_text)
            .set_background_color(PALETTE.primary)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter)
    }

    fn header_format() -> Format {
        Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(PALETTE.header_text)
            .set_background_color(PALETTE.header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(PALETTE.border)
    }

    fn row_format(idx: usize) -> Format {
        let bg = if idx % 2 == 0 { PALETTE.alt_row_1 } else { PALETTE.alt_row_2 };
        Format::new()
            .set_font_size(10)
            .set_background_color(bg)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(PALETTE.border)
    }

    /// Staff roster export: one row per student with a title and summary row.
    pub fn generate_roster_xlsx(students: &[Student]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Students")?;

        let columns = [
            ("#", 6.0),
            ("Name", 28.0),
            ("Register No", 18.0),
            ("Email", 32.0),
            ("Department", 24.0),
            ("College", 36.0),
            ("Year", 8.0),
        ];
        let last_col = (columns.len() - 1) as u16;
        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        worksheet.set_row_height(0, 36)?;
        worksheet.merge_range(0, 0, 0, last_col, "Student Roster", &Self::title_format())?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(PALETTE.primary)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        let now = chrono::Utc::now().format("%d.%m.%Y %H:%M UTC").to_string();
        worksheet.set_row_height(1, 20)?;
        worksheet.merge_range(
            1,
            0,
            1,
            last_col,
            &format!("Exported {}  •  {} students", now, students.len()),
            &subtitle_format,
        )?;

        let header_row = 2;
        let header_format = Self::header_format();
        worksheet.set_row_height(header_row, 26)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        let data_start_row = 3;
        for (idx, student) in students.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let base_fmt = Self::row_format(idx);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);
            let name_fmt = base_fmt.clone().set_bold();

            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 1, &student.name, &name_fmt)?;
            worksheet.write_string_with_format(row, 2, &student.regno, &base_fmt)?;
            worksheet.write_string_with_format(row, 3, student.email.as_deref().unwrap_or("—"), &base_fmt)?;
            worksheet.write_string_with_format(row, 4, student.dept.as_deref().unwrap_or("—"), &base_fmt)?;
            worksheet.write_string_with_format(row, 5, student.college.as_deref().unwrap_or("—"), &base_fmt)?;
            worksheet.write_string_with_format(row, 6, student.year.as_deref().unwrap_or("—"), &center_fmt)?;
        }

        let total_row = data_start_row + students.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(PALETTE.primary)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(PALETTE.border);
        let departments = {
            let mut d: Vec<&str> = students.iter().filter_map(|s| s.dept.as_deref()).collect();
            d.sort_unstable();
            d.dedup();
            d.len()
        };
        worksheet.set_row_height(total_row, 24)?;
        worksheet.merge_range(
            total_row,
            0,
            total_row,
            last_col,
            &format!("Total: {} students across {} departments", students.len(), departments),
            &summary_fmt,
        )?;

        worksheet.set_freeze_panes(3, 0)?;
        worksheet.autofilter(
            header_row,
            0,
            (data_start_row + students.len() as u32).saturating_sub(1).max(header_row),
            last_col,
        )?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Question sheet in the bulk-import layout. With no questions it is the
    /// blank template plus one example row.
    pub fn generate_questions_xlsx(questions: &[Question]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Questions")?;

        let widths = [50.0, 22.0, 22.0, 22.0, 22.0, 22.0, 10.0, 24.0, 22.0];
        for (i, width) in widths.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        let header_format = Self::header_format();
        worksheet.set_row_height(0, 24)?;
        for (i, name) in IMPORT_COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, i as u16, *name, &header_format)?;
        }

        let example;
        let rows: &[Question] = if questions.is_empty() {
            example = [template_example()];
            &example
        } else {
            questions
        };

        for (idx, q) in rows.iter().enumerate() {
            let row = 1 + idx as u32;
            let fmt = Self::row_format(idx).set_text_wrap();
            let option = |n: usize| q.options.get(n).map(String::as_str).unwrap_or("");
            let cells = [
                q.question.as_str(),
                option(0),
                option(1),
                option(2),
                option(3),
                q.correct_answer.as_str(),
            ];
            for (col, value) in cells.iter().enumerate() {
                worksheet.write_string_with_format(row, col as u16, *value, &fmt)?;
            }
            worksheet.write_string_with_format(row, 6, &q.difficulty.to_string(), &fmt)?;
            worksheet.write_string_with_format(row, 7, &q.tags.join(", "), &fmt)?;
            worksheet.write_string_with_format(row, 8, &q.blooms.label(), &fmt)?;
        }

        worksheet.set_freeze_panes(1, 0)?;
        Ok(workbook.save_to_buffer()?)
    }
}

fn template_example() -> Question {
    use crate::models::question::{BloomLevel, Difficulty};
    Question {
        id: String::new(),
        question: "What is the output of 2 + 3 * 4?".into(),
        options: vec!["20".into(), "14".into(), "24".into(), "9".into()],
        correct_answer: "14".into(),
        difficulty: Difficulty::Easy,
        blooms: BloomLevel::Applying,
        tags: vec!["arithmetic".into(), "precedence".into()],
        explanation: None,
    }
}
