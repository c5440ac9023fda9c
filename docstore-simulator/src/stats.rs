// Statistics reporting and CSV export for replay runs

use std::path::Path;

use docstore_rs::LoadBalancer;

use crate::models::{RunSummary, ServerStatsRow};

/// Builds one stats row per server, sorted by id.
pub fn server_rows(balancer: &LoadBalancer) -> Vec<ServerStatsRow> {
    let mut rows: Vec<ServerStatsRow> = balancer
        .servers()
        .map(|server| {
            let stats = server.cache().stats();
            ServerStatsRow {
                server_id: server.id(),
                documents: server.document_count(),
                cached_entries: server.cache().len(),
                cache_capacity: server.cache_capacity().get(),
                pending_edits: server.pending_edits(),
                cache_lookups: stats.lookups,
                cache_hits: stats.hits,
                cache_misses: stats.misses(),
                cache_evictions: stats.evictions,
                cache_hit_rate: stats.hit_rate(),
            }
        })
        .collect();
    rows.sort_by_key(|row| row.server_id);
    rows
}

/// Exports per-server statistics as CSV.
pub fn export_csv(balancer: &LoadBalancer, path: &Path) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in server_rows(balancer) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Prints the end-of-run summary.
pub fn print_summary(summary: &RunSummary, balancer: &LoadBalancer) {
    println!();
    println!("Replay complete");
    println!("===============");
    println!("Commands executed: {}", summary.commands);
    println!(
        "Requests: {} edits, {} gets ({} faults, {} unroutable)",
        summary.edits, summary.gets, summary.faults, summary.unroutable
    );
    println!(
        "Topology: {} joins, {} leaves, {} servers remaining",
        summary.joins,
        summary.leaves,
        balancer.server_count()
    );

    for row in server_rows(balancer) {
        println!(
            "  server {}: {} documents, {}/{} cached, {} pending edits, hit rate {:.2}%",
            row.server_id,
            row.documents,
            row.cached_entries,
            row.cache_capacity,
            row.pending_edits,
            row.cache_hit_rate * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Command, RunConfig};
    use crate::runner::ScriptRunner;
    use docstore_rs::protocol::Request;

    fn runner_with_two_servers() -> ScriptRunner {
        let mut runner = ScriptRunner::new(RunConfig {
            script: std::path::PathBuf::new(),
            enable_vnodes: false,
            quiet: true,
        });
        runner.execute(Command::AddServer {
            id: 1,
            cache_capacity: 4,
        });
        runner.execute(Command::AddServer {
            id: 2,
            cache_capacity: 4,
        });
        for i in 0..6 {
            runner.execute(Command::Request(Request::Edit {
                name: format!("doc-{i}"),
                content: "v".into(),
            }));
        }
        for i in 0..6 {
            runner.execute(Command::Request(Request::Get {
                name: format!("doc-{i}"),
            }));
        }
        runner
    }

    #[test]
    fn test_rows_are_sorted_and_complete() {
        let runner = runner_with_two_servers();
        let rows = server_rows(runner.balancer());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].server_id, 1);
        assert_eq!(rows[1].server_id, 2);
        let documents: usize = rows.iter().map(|r| r.documents).sum();
        assert_eq!(documents, 6);
    }

    #[test]
    fn test_csv_export_writes_header_and_rows() {
        let runner = runner_with_two_servers();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        export_csv(runner.balancer(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("server_id,documents,"));
        assert_eq!(lines.count(), 2);
    }
}
