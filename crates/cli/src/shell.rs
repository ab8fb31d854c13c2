//! Line-oriented command interpreter behind `mdrecorder`.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use clock::{Clock, EARLIEST, LATEST};
use config::StoreConfig;
use journal::{Journal, JournalAppender, JournalOptions, Side, Tick, TickSchema};
use std::fmt::Write as _;
use std::sync::Arc;
use tickstore::{ingest, Batch, ColumnData, LocalTickstore, LocalTickstoreOptions, Tickstore};

pub const HELP: &str = "\
Commands: RECORD product buy|sell size price | ROLL | REPLAY yyyy-mm-dd
          SELECT symbol start end [as_of] | DELETE symbol yyyy-mm-dd
          VERSIONS symbol yyyy-mm-dd | DAYS | FLUSH | STATS | EXIT";

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Continue(String),
    Exit(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Continue(s) | Reply::Exit(s) => s,
        }
    }
}

/// Journal appender plus tickstore, driven one command line at a time.
pub struct Shell {
    journal: Journal,
    appender: JournalAppender,
    store: LocalTickstore,
    timestamp_column: String,
    sequence: i64,
}

impl Shell {
    pub fn open(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let schema = TickSchema::from_version(config.journal_schema)
            .with_context(|| format!("unknown journal schema {}", config.journal_schema))?;
        let journal = Journal::with_options(
            &config.journal_dir,
            JournalOptions {
                capacity: config.journal_capacity,
                schema,
            },
            clock.clone(),
        )
        .with_context(|| format!("failed to open journal at {}", config.journal_dir.display()))?;
        let sequence = resumed_sequence(&journal, clock.today())?;
        let store = LocalTickstore::open(
            &config.tickstore_dir,
            LocalTickstoreOptions {
                timestamp_column: config.timestamp_column.clone(),
                extension: config.splay_extension.clone(),
                compression_level: config.compression_level,
            },
            clock,
        )
        .with_context(|| {
            format!("failed to open tickstore at {}", config.tickstore_dir.display())
        })?;

        Ok(Self {
            appender: journal.create_appender(),
            journal,
            store,
            timestamp_column: config.timestamp_column.clone(),
            sequence,
        })
    }

    /// Runs one command line. Failures are reported as `ERR ...` replies.
    pub fn execute(&mut self, line: &str) -> Reply {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Reply::Continue(String::new());
        };
        let args: Vec<&str> = parts.collect();

        let result = match cmd.to_uppercase().as_str() {
            "RECORD" => self.record(&args),
            "ROLL" => self.roll(),
            "REPLAY" => self.replay(&args),
            "SELECT" => self.select(&args),
            "DELETE" => self.delete(&args),
            "VERSIONS" => self.versions(&args),
            "DAYS" => self.days(),
            "FLUSH" => self.flush(),
            "STATS" => Ok(self.stats()),
            "HELP" => Ok(HELP.to_string()),
            "EXIT" | "QUIT" => {
                return match self.close() {
                    Ok(()) => Reply::Exit("bye".to_string()),
                    Err(e) => Reply::Exit(format!("ERR close failed: {e:#}")),
                }
            }
            other => Err(anyhow!("unknown command: {other}")),
        };
        Reply::Continue(result.unwrap_or_else(|e| format!("ERR {e:#}")))
    }

    /// Finalizes the open day file and persists the index.
    pub fn close(&mut self) -> Result<()> {
        self.appender.close()?;
        self.store.close()?;
        Ok(())
    }

    fn record(&mut self, args: &[&str]) -> Result<String> {
        let [product, side, size, price] = args else {
            bail!("usage: RECORD product buy|sell size price");
        };
        let side = match side.to_lowercase().as_str() {
            "buy" | "b" => Side::Buy,
            "sell" | "s" => Side::Sell,
            other => bail!("side must be buy or sell, got {other:?}"),
        };
        tickstore::validate_symbol(product)?;
        let size: f64 = size.parse().with_context(|| format!("bad size {size:?}"))?;
        let price: f64 = price.parse().with_context(|| format!("bad price {price:?}"))?;

        let sequence = self.sequence + 1;
        self.appender.append_tick(&Tick {
            timestamp: None,
            sequence,
            trade_id: sequence,
            product: product.to_string(),
            side,
            size,
            price,
        })?;
        self.sequence = sequence;

        let day = self
            .appender
            .current_date()
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        Ok(format!("OK (day={day}, pos={})", self.appender.position()))
    }

    fn roll(&mut self) -> Result<String> {
        let day = self.appender.current_date();
        self.appender.close()?;
        Ok(match day {
            Some(d) => format!("OK (finalized {d})"),
            None => "OK (nothing open)".to_string(),
        })
    }

    fn replay(&mut self, args: &[&str]) -> Result<String> {
        let [date] = args else {
            bail!("usage: REPLAY yyyy-mm-dd");
        };
        let date = parse_date(date)?;
        let written =
            ingest::ingest_journal_day(&self.journal, date, &mut self.store, &self.timestamp_column)?;
        let mut out = String::new();
        for path in &written {
            let _ = writeln!(out, "{}", path.display());
        }
        let _ = write!(out, "OK ({} products)", written.len());
        Ok(out)
    }

    fn select(&mut self, args: &[&str]) -> Result<String> {
        let (symbol, start, end, as_of) = match args {
            [symbol, start, end] => (symbol, start, end, None),
            [symbol, start, end, as_of] => (symbol, start, end, Some(as_of)),
            _ => bail!("usage: SELECT symbol start end [as_of]"),
        };
        let start = parse_instant(start, false)?;
        let end = parse_instant(end, true)?;
        let as_of = match as_of {
            Some(s) => parse_instant(s, false)?,
            None => LATEST,
        };
        let batch = self.store.select(symbol, start, end, as_of)?;
        Ok(format_batch(&batch))
    }

    fn delete(&mut self, args: &[&str]) -> Result<String> {
        let [symbol, date] = args else {
            bail!("usage: DELETE symbol yyyy-mm-dd");
        };
        let date = parse_date(date)?;
        Ok(if self.store.delete(symbol, tickstore::BiTimestamp::new(date))? {
            "OK".to_string()
        } else {
            "(nil)".to_string()
        })
    }

    fn versions(&mut self, args: &[&str]) -> Result<String> {
        let [symbol, date] = args else {
            bail!("usage: VERSIONS symbol yyyy-mm-dd");
        };
        let date = parse_date(date)?;
        let rows = self.store.index().versions(symbol, date);
        if rows.is_empty() {
            return Ok("(empty)".to_string());
        }
        let mut out = String::new();
        for row in &rows {
            let _ = writeln!(
                out,
                "v{:04} [{}, {}) {}",
                row.version,
                format_instant(row.start_time),
                format_instant(row.end_time),
                row.path.display()
            );
        }
        let _ = write!(out, "({} versions)", rows.len());
        Ok(out)
    }

    fn days(&self) -> Result<String> {
        let days = self.journal.days()?;
        let mut out = String::new();
        for d in &days {
            let _ = writeln!(out, "{d}");
        }
        let _ = write!(out, "({} days)", days.len());
        Ok(out)
    }

    fn flush(&mut self) -> Result<String> {
        self.appender.flush()?;
        self.store.flush()?;
        Ok("OK".to_string())
    }

    fn stats(&self) -> String {
        let index = self.store.index();
        format!(
            "journal={} schema=v{} day={} pos={} seq={}\ntickstore={} symbols={} rows={}",
            self.journal.base_path().display(),
            self.journal.schema().version(),
            self.appender
                .current_date()
                .map_or_else(|| "-".to_string(), |d| d.to_string()),
            self.appender.position(),
            self.sequence,
            self.store.base().display(),
            index.symbols().len(),
            index.len(),
        )
    }
}

/// Last sequence number recorded today, so a restart mid-day continues
/// the count instead of repeating it.
fn resumed_sequence(journal: &Journal, today: NaiveDate) -> Result<i64> {
    if !journal.day_path(today).is_file() {
        return Ok(0);
    }
    let reader = journal
        .create_reader(today)
        .with_context(|| format!("failed to read journal for {today}"))?;
    let sequence = reader.last_tick().map_or(0, |t| t.sequence);
    tracing::info!(%today, sequence, "resuming tick sequence");
    Ok(sequence)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("bad date {s:?}"))
}

/// RFC 3339, `yyyy-mm-dd`, `earliest` or `latest`. A bare date is the
/// start of that day, or its last nanosecond when `end_of_day` is set.
pub fn parse_instant(s: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    match s.to_lowercase().as_str() {
        "latest" => return Ok(LATEST),
        "earliest" => return Ok(EARLIEST),
        _ => {}
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    let date = parse_date(s).with_context(|| format!("bad instant {s:?}"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    let naive = date.and_time(time.ok_or_else(|| anyhow!("bad time of day"))?);
    Ok(Utc.from_utc_datetime(&naive))
}

fn format_instant(t: DateTime<Utc>) -> String {
    if t == EARLIEST {
        "earliest".to_string()
    } else if t == LATEST {
        "latest".to_string()
    } else {
        t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

fn format_batch(batch: &Batch) -> String {
    if batch.num_rows() == 0 {
        return "(empty)".to_string();
    }
    let mut out = String::new();
    let names: Vec<&str> = batch.columns().iter().map(|c| c.name.as_str()).collect();
    let _ = writeln!(out, "{}", names.join("\t"));
    for row in 0..batch.num_rows() {
        let cells: Vec<String> = batch
            .columns()
            .iter()
            .map(|c| format_cell(&c.data, row))
            .collect();
        let _ = writeln!(out, "{}", cells.join("\t"));
    }
    let _ = write!(out, "({} rows)", batch.num_rows());
    out
}

fn format_cell(data: &ColumnData, row: usize) -> String {
    match data {
        ColumnData::Int16(v) => v[row].to_string(),
        ColumnData::Int64(v) => v[row].to_string(),
        ColumnData::Float64(v) => v[row].to_string(),
        ColumnData::Utf8(v) => v[row].clone(),
        ColumnData::Timestamp(v) => format_instant(Utc.timestamp_nanos(v[row])),
    }
}
