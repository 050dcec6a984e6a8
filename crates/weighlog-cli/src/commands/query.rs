//! `weighlog query`: historical rows by date range and experiment.

use weighlog_core::{EngineConfig, HistoricalQuery, QueryFilter, QueryResult};

/// Run the query command.
pub fn run(
    config: &EngineConfig,
    start: &str,
    end: &str,
    experiments: &str,
    json: bool,
    output: Option<&str>,
) {
    let filter = QueryFilter::parse(start, end, experiments).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let query = HistoricalQuery::new(config.telemetry_log());
    let result = match query.filter(&filter) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error reading log: {e}");
            std::process::exit(1);
        }
    };

    if result.is_empty() {
        println!(
            "No data found for experiments {} between {} and {}.",
            format_ids(&filter),
            filter.start(),
            filter.end()
        );
    } else if json {
        println!("{}", to_json(&filter, &result));
    } else {
        print_table(&result);
    }

    if result.dropped > 0 {
        eprintln!("Note: {} malformed row(s) skipped.", result.dropped);
    }

    if let Some(path) = output {
        match std::fs::write(path, to_json(&filter, &result)) {
            Ok(()) => println!("Results written to {path}"),
            Err(e) => {
                eprintln!("Failed to write {path}: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn format_ids(filter: &QueryFilter) -> String {
    filter
        .ids()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_json(filter: &QueryFilter, result: &QueryResult) -> String {
    let value = serde_json::json!({
        "filter": {
            "start": filter.start(),
            "end": filter.end(),
            "experiments": filter.ids(),
        },
        "rows": result.len(),
        "dropped": result.dropped,
        "latest": result.latest(),
        "records": result.records,
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

fn print_table(result: &QueryResult) {
    println!(
        "{:<10}  {:<8}  {:<8}  {:>7}  {:>7}  {:>10}  {:>10}  {:>10}  {:>7}",
        "Date", "Time", "Exp", "T1 °C", "T2 °C", "W1 kg", "W2 kg", "Δ kg", "Room °C"
    );
    println!("{}", "-".repeat(96));
    for r in &result.records {
        println!(
            "{:<10}  {:<8}  {:<8}  {:>7}  {:>7}  {:>10}  {:>10}  {:>10}  {:>7}",
            r.date,
            r.time,
            r.experiment,
            r.temp_1,
            r.temp_2,
            r.weight_1,
            r.weight_2,
            r.difference,
            r.room_temp
        );
    }
    println!();
    println!("{} row(s)", result.len());

    if let Some(latest) = result.latest() {
        let fmt = |v: Option<f64>, digits: usize| match v {
            Some(v) => format!("{v:.digits$}"),
            None => "—".to_string(),
        };
        println!(
            "Latest {}: W1 {} kg  W2 {} kg  Δ {} kg",
            latest.experiment,
            fmt(latest.weight_1, 4),
            fmt(latest.weight_2, 4),
            fmt(latest.difference, 4)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use weighlog_core::PersistedRecord;

    fn record() -> PersistedRecord {
        PersistedRecord {
            date: "2024-05-01".to_string(),
            time: "10:00:00".to_string(),
            experiment: "EXP_2".to_string(),
            temp_1: "29.80".to_string(),
            temp_2: "27.30".to_string(),
            weight_1: "30.1500".to_string(),
            weight_2: "15.1800".to_string(),
            difference: "14.9700".to_string(),
            room_temp: "0.00".to_string(),
        }
    }

    #[test]
    fn test_json_shape() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let filter = QueryFilter::new(day, day, [2, 1]).unwrap();
        let result = QueryResult {
            records: vec![record()],
            dropped: 1,
        };
        let v: serde_json::Value = serde_json::from_str(&to_json(&filter, &result)).unwrap();
        assert_eq!(v["rows"], 1);
        assert_eq!(v["dropped"], 1);
        assert_eq!(v["filter"]["start"], "2024-05-01");
        assert_eq!(v["filter"]["experiments"], serde_json::json!([1, 2]));
        assert_eq!(v["records"][0]["experiment"], "EXP_2");
        assert_eq!(v["latest"]["difference"], 14.97);
    }

    #[test]
    fn test_format_ids_sorted() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let filter = QueryFilter::new(day, day, [7, 3, 1]).unwrap();
        assert_eq!(format_ids(&filter), "1, 3, 7");
    }
}
