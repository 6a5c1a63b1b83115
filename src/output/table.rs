//! Table output formatting

use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

/// Format data as a table
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(data);
    // Header row centered, body left-aligned
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled)]
    struct SettingRow {
        #[tabled(rename = "KEY")]
        key: &'static str,
        #[tabled(rename = "VALUE")]
        value: &'static str,
    }

    #[test]
    fn test_format_table_empty() {
        let rows: Vec<SettingRow> = vec![];
        assert_eq!(format_table(&rows), "No results found.");
    }

    #[test]
    fn test_settings_render_in_rounded_table() {
        let rows = [
            SettingRow {
                key: "cloudinary_cloud_name",
                value: "demo",
            },
            SettingRow {
                key: "supabase_storage_enabled",
                value: "false",
            },
        ];

        let result = format_table(&rows);

        assert!(result.starts_with('╭'));
        assert!(result.lines().nth(1).is_some_and(|header| header.contains("KEY")));
        assert!(result.contains("cloudinary_cloud_name"));
        assert!(result.contains("supabase_storage_enabled"));
    }
}
