//! Binlog event decoding and position-based selection.
//!
//! Framing, checksums and payload decoding are done by `mysql_common`'s
//! binlog module. This module turns its events into owned [`EventHeader`] /
//! [`EventBody`] values; row images become [`RowChange`]s of SQL literals.

use anyhow::{anyhow, Context};
use binlog_schema::RowChange;
use mysql_common::binlog::consts::BinlogVersion;
use mysql_common::binlog::events::{Event, EventData, RowsEventData, TableMapEvent};
use mysql_common::binlog::row::BinlogRow;
use mysql_common::binlog::value::BinlogValue;
use mysql_common::binlog::BinlogFile;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Position of the first event in a binlog file, right after the magic number.
pub const BINLOG_START_POSITION: u64 = 4;

/// Common header of a binlog event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    pub timestamp: u32,
    pub event_type: u8,
    pub event_type_name: String,
    pub server_id: u32,
    pub event_size: u32,
    /// Position right after this event, where the next one starts
    pub log_position: u32,
}

impl EventHeader {
    pub fn from_event(event: &Event) -> Self {
        let header = event.header();
        let event_type = header.event_type_raw();
        let event_type_name = match header.event_type() {
            Ok(known) => format!("{known:?}"),
            Err(_) => format!("UNKNOWN_EVENT_{event_type}"),
        };
        Self {
            timestamp: header.timestamp(),
            event_type,
            event_type_name,
            server_id: header.server_id(),
            event_size: header.event_size(),
            log_position: header.log_pos(),
        }
    }

    /// Byte offset at which this event starts.
    pub fn start_position(&self) -> u64 {
        u64::from(self.log_position).saturating_sub(u64::from(self.event_size))
    }

    /// Byte offset at which the next event starts.
    pub fn end_position(&self) -> u64 {
        u64::from(self.log_position)
    }
}

/// Column of a table map event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapColumn {
    /// MySQL column type code, `None` if the decoder did not recognize it
    pub type_code: Option<u8>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapInfo {
    pub table_id: u64,
    pub database: String,
    pub table: String,
    pub columns: Vec<TableMapColumn>,
}

/// Decoded rows of a write/update/delete rows event.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsEvent {
    pub table_id: u64,
    pub database: String,
    pub table: String,
    pub change: RowChange<String>,
}

/// Payload of a decoded event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    FormatDescription {
        server_version: String,
    },
    Query {
        schema: String,
        query: String,
        execution_time: u64,
        error_code: u64,
    },
    Rotate {
        next_log: String,
        position: u64,
    },
    Gtid {
        gtid: String,
    },
    TableMap(TableMapInfo),
    Rows(RowsEvent),
    /// Any other event, in the decoder's debug form
    Other(String),
}

/// Sequential reader over the events of a binlog file.
pub struct BinlogReader<R> {
    binlog: BinlogFile<R>,
}

impl BinlogReader<BufReader<File>> {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::new(BufReader::new(file))
            .with_context(|| format!("Failed to read binlog header of {}", path.display()))
    }
}

impl<R: BufRead> BinlogReader<R> {
    /// Wrap a stream positioned at the binlog magic number.
    pub fn new(read: R) -> anyhow::Result<Self> {
        let binlog = BinlogFile::new(BinlogVersion::Version4, read)?;
        Ok(Self { binlog })
    }

    /// Read the next event. Table map events are remembered by the decoder so
    /// later rows events can be decoded.
    pub fn next_event(&mut self) -> anyhow::Result<Option<Event>> {
        match self.binlog.next() {
            Some(event) => Ok(Some(event.context("Failed to read binlog event")?)),
            None => Ok(None),
        }
    }

    /// Decode the payload of an event returned by [`BinlogReader::next_event`].
    pub fn decode(&self, event: &Event) -> anyhow::Result<EventBody> {
        let data = event
            .read_data()
            .context("Failed to decode binlog event payload")?;

        let body = match data {
            Some(EventData::FormatDescriptionEvent(fde)) => EventBody::FormatDescription {
                server_version: fde.server_version().trim_end_matches('\0').to_string(),
            },
            Some(EventData::QueryEvent(query)) => EventBody::Query {
                schema: query.schema().into_owned(),
                query: query.query().into_owned(),
                execution_time: u64::from(query.execution_time()),
                error_code: u64::from(query.error_code()),
            },
            Some(EventData::RotateEvent(rotate)) => EventBody::Rotate {
                next_log: rotate.name().into_owned(),
                position: rotate.position(),
            },
            Some(EventData::GtidEvent(gtid)) => EventBody::Gtid {
                gtid: format_gtid(&gtid.sid(), gtid.gno()),
            },
            Some(EventData::TableMapEvent(tme)) => EventBody::TableMap(table_map_info(&tme)),
            Some(EventData::RowsEvent(rows)) => self.decode_rows(&rows)?,
            Some(other) => EventBody::Other(format!("{other:?}")),
            None => EventBody::Other("(payload not decoded)".to_string()),
        };
        Ok(body)
    }

    fn decode_rows(&self, rows: &RowsEventData<'_>) -> anyhow::Result<EventBody> {
        let table_id = rows.table_id();
        let Some(tme) = self.binlog.reader().get_tme(table_id) else {
            tracing::warn!("Rows event references table id {table_id} without a preceding table map");
            return Ok(EventBody::Other(format!(
                "rows event for unknown table id {table_id}"
            )));
        };

        let database = tme.database_name().into_owned();
        let table = tme.table_name().into_owned();

        let mut images = Vec::new();
        for row in rows.rows(tme) {
            let (before, after) =
                row.with_context(|| format!("Failed to decode row of {database}.{table}"))?;
            images.push((before.map(render_row), after.map(render_row)));
        }

        let change = match rows {
            RowsEventData::WriteRowsEventV1(_) | RowsEventData::WriteRowsEvent(_) => {
                RowChange::Insert(images.into_iter().filter_map(|(_, after)| after).collect())
            }
            RowsEventData::DeleteRowsEventV1(_) | RowsEventData::DeleteRowsEvent(_) => {
                RowChange::Delete(images.into_iter().filter_map(|(before, _)| before).collect())
            }
            RowsEventData::UpdateRowsEventV1(_)
            | RowsEventData::UpdateRowsEvent(_)
            | RowsEventData::PartialUpdateRowsEvent(_) => RowChange::Update(
                images
                    .into_iter()
                    .map(|(before, after)| match (before, after) {
                        (Some(before), Some(after)) => Ok((before, after)),
                        _ => Err(anyhow!(
                            "Update of {database}.{table} is missing a row image"
                        )),
                    })
                    .collect::<anyhow::Result<_>>()?,
            ),
        };

        Ok(EventBody::Rows(RowsEvent {
            table_id,
            database,
            table,
            change,
        }))
    }
}

fn table_map_info(tme: &TableMapEvent<'_>) -> TableMapInfo {
    let null_bitmask = tme.null_bitmask();
    let columns = (0..tme.columns_count() as usize)
        .map(|idx| TableMapColumn {
            type_code: tme
                .get_column_type(idx)
                .ok()
                .flatten()
                .map(|column_type| column_type as u8),
            nullable: null_bitmask.get(idx).map(|bit| *bit).unwrap_or(false),
        })
        .collect();

    TableMapInfo {
        table_id: tme.table_id(),
        database: tme.database_name().into_owned(),
        table: tme.table_name().into_owned(),
        columns,
    }
}

fn render_row(row: BinlogRow) -> Vec<String> {
    (0..row.len()).map(|idx| render_value(row.as_ref(idx))).collect()
}

/// Render a row value as a SQL literal.
fn render_value(value: Option<&BinlogValue<'_>>) -> String {
    match value {
        Some(BinlogValue::Value(value)) => value.as_sql(false),
        Some(other) => format!("{other:?}"),
        None => "NULL".to_string(),
    }
}

/// `sid:gno` with the source id in UUID form.
pub fn format_gtid(sid: &[u8], gno: u64) -> String {
    let hex: String = sid.iter().map(|b| format!("{b:02x}")).collect();
    if hex.len() != 32 {
        return format!("{hex}:{gno}");
    }
    format!(
        "{}-{}-{}-{}-{}:{gno}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Which events a run processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every event in the file
    All,
    /// Only the event starting at this position
    At(u64),
}

impl Selection {
    /// `--all` wins, then `--offset`, then `--log-position`.
    pub fn resolve(
        all: bool,
        offset: Option<u64>,
        log_position: Option<u64>,
    ) -> anyhow::Result<Self> {
        if all {
            return Ok(Selection::All);
        }
        offset
            .or(log_position)
            .map(Selection::At)
            .ok_or_else(|| anyhow!("Either offset, log position, or --all flag must be specified"))
    }

    pub fn start_position(&self) -> u64 {
        match self {
            Selection::All => BINLOG_START_POSITION,
            Selection::At(position) => *position,
        }
    }
}

/// What to do with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Process,
    Skip,
    /// The event after the target was reached with stop-at-next enabled
    Stop,
}

#[derive(Debug, Clone)]
pub struct PositionFilter {
    selection: Selection,
    stop_at_next: bool,
    found: bool,
}

impl PositionFilter {
    pub fn new(selection: Selection, stop_at_next: bool) -> Self {
        Self {
            selection,
            stop_at_next,
            found: false,
        }
    }

    pub fn decide(&mut self, header: &EventHeader) -> Decision {
        let start = header.start_position();
        match self.selection {
            Selection::All => {
                self.found = true;
                Decision::Process
            }
            Selection::At(target) if start == target => {
                self.found = true;
                Decision::Process
            }
            Selection::At(target) if self.found && self.stop_at_next && start > target => {
                Decision::Stop
            }
            Selection::At(_) => Decision::Skip,
        }
    }

    /// Whether any event has been selected so far.
    pub fn found(&self) -> bool {
        self.found
    }
}
