use anyhow::Result;
use itertools::Itertools;
use rusqlite::Connection;
use std::collections::HashMap;

use crate::db::{self, StatsRow};
use crate::normalize::experience::Grade;

pub fn print_stats(conn: &Connection) -> Result<()> {
    let rows = db::fetch_stats_rows(conn)?;
    if rows.is_empty() {
        println!("No normalized postings; run `process` first.");
        return Ok(());
    }

    let markdown = render_markdown(&rows);
    persist_stats(conn, &rows, &markdown)?;
    println!("{markdown}");
    Ok(())
}

fn render_markdown(rows: &[StatsRow]) -> String {
    let total = rows.len();
    let with_salary = rows.iter().filter(|r| r.salary_base.is_some()).count();

    let mut out = String::new();
    out.push_str("## Dataset Stats\n");
    out.push_str(&format!(
        "- Normalized postings: {}\n- With a salary figure: {} ({:.1}%)\n",
        total,
        with_salary,
        percent(with_salary, total)
    ));

    out.push_str("\n### Postings by grade\n");
    for grade in Grade::ALL {
        let count = count_grade(rows, grade.label());
        out.push_str(&format!(
            "- {}: {} ({:.1}%)\n",
            grade.label(),
            count,
            percent(count, total)
        ));
    }

    for label in query_labels(rows) {
        out.push_str(&format!("\n### Typical profile: {}\n", label));
        for grade in Grade::ALL {
            let subset: Vec<&StatsRow> = rows
                .iter()
                .filter(|r| r.query_label == label && r.grade == grade.label())
                .collect();
            if subset.is_empty() {
                continue;
            }
            let area = top_area(&subset).unwrap_or_else(|| "-".to_string());
            let salary = median_salary(&subset)
                .map(|m| format!("{:.0}", m))
                .unwrap_or_else(|| "-".to_string());
            let skills = top_skills(&subset, 5).join(", ");
            out.push_str(&format!(
                "- {}: {} postings, area {}, median salary {}, skills: {}\n",
                grade.label(),
                subset.len(),
                area,
                salary,
                skills
            ));
        }
    }

    out
}

fn query_labels(rows: &[StatsRow]) -> Vec<String> {
    rows.iter()
        .map(|r| r.query_label.clone())
        .unique()
        .sorted()
        .collect()
}

fn count_grade(rows: &[StatsRow], grade_label: &str) -> usize {
    rows.iter().filter(|r| r.grade == grade_label).count()
}

fn top_area(rows: &[&StatsRow]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.area.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(area, n)| (*n, std::cmp::Reverse(*area)))
        .map(|(area, _)| area.to_string())
}

fn median_salary(rows: &[&StatsRow]) -> Option<f64> {
    let mut values: Vec<f64> = rows.iter().filter_map(|r| r.salary_base).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

fn top_skills(rows: &[&StatsRow], n: usize) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        for skill in row.skills.split(", ").filter(|s| !s.is_empty()) {
            *counts.entry(skill).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .sorted_by_key(|(skill, n)| (std::cmp::Reverse(*n), *skill))
        .take(n)
        .map(|(skill, _)| skill.to_string())
        .collect()
}

fn persist_stats(conn: &Connection, rows: &[StatsRow], markdown: &str) -> Result<()> {
    conn.execute("DELETE FROM pipeline_stats", [])?;

    let total = rows.len();
    let with_salary = rows.iter().filter(|r| r.salary_base.is_some()).count();
    db::upsert_stat(conn, "total_postings", &total.to_string())?;
    db::upsert_stat(conn, "with_salary", &with_salary.to_string())?;
    db::upsert_stat(
        conn,
        "with_salary_pct",
        &format!("{:.2}", percent(with_salary, total)),
    )?;
    for grade in Grade::ALL {
        db::upsert_stat(
            conn,
            &format!("grade:{}:count", grade.label()),
            &count_grade(rows, grade.label()).to_string(),
        )?;
    }
    for label in query_labels(rows) {
        for grade in Grade::ALL {
            let subset: Vec<&StatsRow> = rows
                .iter()
                .filter(|r| r.query_label == label && r.grade == grade.label())
                .collect();
            if subset.is_empty() {
                continue;
            }
            let key = format!("profile:{}:{}", label, grade.label());
            db::upsert_stat(conn, &format!("{key}:count"), &subset.len().to_string())?;
            if let Some(area) = top_area(&subset) {
                db::upsert_stat(conn, &format!("{key}:area"), &area)?;
            }
            if let Some(median) = median_salary(&subset) {
                db::upsert_stat(conn, &format!("{key}:median_salary"), &format!("{:.0}", median))?;
            }
            db::upsert_stat(conn, &format!("{key}:skills"), &top_skills(&subset, 5).join(", "))?;
        }
    }
    db::upsert_stat(conn, "markdown", markdown)?;
    Ok(())
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str, grade: Grade, area: &str, salary: Option<f64>, skills: &str) -> StatsRow {
        StatsRow {
            query_label: label.into(),
            grade: grade.label().into(),
            area: area.into(),
            salary_base: salary,
            skills: skills.into(),
        }
    }

    #[test]
    fn median_handles_even_and_odd_counts() {
        let rows = [
            row("da", Grade::Junior, "Москва", Some(100.0), ""),
            row("da", Grade::Junior, "Москва", Some(200.0), ""),
            row("da", Grade::Junior, "Москва", None, ""),
        ];
        let refs: Vec<&StatsRow> = rows.iter().collect();
        assert_eq!(median_salary(&refs), Some(150.0));

        let rows = [
            row("da", Grade::Junior, "Москва", Some(100.0), ""),
            row("da", Grade::Junior, "Москва", Some(200.0), ""),
            row("da", Grade::Junior, "Москва", Some(400.0), ""),
        ];
        let refs: Vec<&StatsRow> = rows.iter().collect();
        assert_eq!(median_salary(&refs), Some(200.0));
    }

    #[test]
    fn top_skills_break_ties_deterministically() {
        let rows = [
            row("da", Grade::Junior, "Москва", None, "sql, python"),
            row("da", Grade::Junior, "Москва", None, "sql, excel"),
        ];
        let refs: Vec<&StatsRow> = rows.iter().collect();
        assert_eq!(top_skills(&refs, 2), vec!["sql", "excel"]);
    }

    #[test]
    fn markdown_names_every_grade() {
        let rows = vec![row("ds", Grade::Middle, "Москва", Some(250_000.0), "python")];
        let md = render_markdown(&rows);
        assert!(md.contains("Middle (3-6 years)"));
        assert!(md.contains("Typical profile: ds"));
    }
}
