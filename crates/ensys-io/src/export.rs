//! CSV export of solved flow series.

use ensys_core::{EnsysError, EnsysResult, ResultsSet, TimeIndex};
use std::io::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write one row per timestep: a `timestamp` column followed by one column per
/// flow, named `from -> to`. With `bus` set, only flows touching that bus are
/// written.
pub fn write_results_csv<W: Write>(
    results: &ResultsSet,
    time_index: &TimeIndex,
    writer: W,
    bus: Option<&str>,
) -> EnsysResult<()> {
    let columns: Vec<_> = match bus {
        Some(bus) => {
            let columns: Vec<_> = results.touching(bus).collect();
            if columns.is_empty() {
                return Err(EnsysError::persistence(format!(
                    "no flows touch bus '{}'",
                    bus
                )));
            }
            columns
        }
        None => results.flows.iter().collect(),
    };
    if let Some(series) = columns.iter().find(|s| s.values.len() != time_index.len()) {
        return Err(EnsysError::persistence(format!(
            "flow '{}' has {} values for {} timestamps",
            series.name(),
            series.values.len(),
            time_index.len()
        )));
    }

    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["timestamp".to_string()];
    header.extend(columns.iter().map(|s| s.name()));
    out.write_record(&header).map_err(csv_error)?;

    for (t, stamp) in time_index.iter().enumerate() {
        let mut record = Vec::with_capacity(columns.len() + 1);
        record.push(stamp.format(TIMESTAMP_FORMAT).to_string());
        record.extend(columns.iter().map(|s| s.values[t].to_string()));
        out.write_record(&record).map_err(csv_error)?;
    }
    out.flush()?;
    Ok(())
}

fn csv_error(err: csv::Error) -> EnsysError {
    EnsysError::Io(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensys_core::{FlowSeries, SolveMeta, SolveStatus, TimeIndexBuilder};

    fn results() -> ResultsSet {
        ResultsSet {
            flows: vec![
                FlowSeries {
                    from: "pv".into(),
                    to: "electricity".into(),
                    values: vec![1.5, 2.0],
                },
                FlowSeries {
                    from: "gas".into(),
                    to: "heat".into(),
                    values: vec![0.0, 4.0],
                },
            ],
            meta: SolveMeta {
                objective: 0.0,
                status: SolveStatus::Optimal,
                solver: "clarabel".into(),
                solve_time_ms: None,
                num_variables: 4,
                num_constraints: 4,
            },
        }
    }

    #[test]
    fn test_all_flows() {
        let index = TimeIndexBuilder::new("2022-01-01").periods(2).build().unwrap();
        let mut buf = Vec::new();
        write_results_csv(&results(), &index, &mut buf, None).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,pv -> electricity,gas -> heat");
        assert_eq!(lines[1], "2022-01-01 00:00:00,1.5,0");
        assert_eq!(lines[2], "2022-01-01 01:00:00,2,4");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_bus_filter() {
        let index = TimeIndexBuilder::new("2022-01-01").periods(2).build().unwrap();
        let mut buf = Vec::new();
        write_results_csv(&results(), &index, &mut buf, Some("heat")).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("timestamp,gas -> heat\n"));

        let err = write_results_csv(&results(), &index, Vec::new(), Some("nope")).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_length_mismatch() {
        let index = TimeIndexBuilder::new("2022-01-01").periods(3).build().unwrap();
        assert!(write_results_csv(&results(), &index, Vec::new(), None).is_err());
    }
}
