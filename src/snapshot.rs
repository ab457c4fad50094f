use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::model::{Dataset, Fixture, Player, Position, Team};

const SNAPSHOT_MAGIC: [u8; 4] = *b"FPLS";
/// Bumped whenever any persisted field changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    version: u32,
}

// On disk, entity ids are text keys.
#[derive(Serialize)]
struct SnapshotBodyRef<'a> {
    saved_at: DateTime<Utc>,
    teams: BTreeMap<String, &'a Team>,
    positions: BTreeMap<String, &'a Position>,
    players: BTreeMap<String, &'a Player>,
    fixtures: &'a [Fixture],
}

#[derive(Deserialize)]
struct SnapshotBody {
    saved_at: DateTime<Utc>,
    teams: BTreeMap<String, Team>,
    positions: BTreeMap<String, Position>,
    players: BTreeMap<String, Player>,
    fixtures: Vec<Fixture>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    pub dataset: Dataset,
}

impl Snapshot {
    /// Fresh means written on `today` in local time.
    pub fn is_fresh_on(&self, today: NaiveDate) -> bool {
        self.saved_at.with_timezone(&Local).date_naive() == today
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, dataset: &Dataset) -> DataResult<DateTime<Utc>> {
        let saved_at = Utc::now();
        self.save_at(dataset, saved_at)?;
        Ok(saved_at)
    }

    /// Writes to a sibling temp file and renames it over the target.
    pub fn save_at(&self, dataset: &Dataset, saved_at: DateTime<Utc>) -> DataResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|err| self.write_error(err))?;
            }
        }
        let tmp = self.tmp_path();
        let result = self.write_file(&tmp, dataset, saved_at).and_then(|()| {
            fs::rename(&tmp, &self.path).map_err(|err| self.write_error(err))
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;
        log::info!(
            "saved snapshot with {} players to {}",
            dataset.players.len(),
            self.path.display()
        );
        Ok(())
    }

    fn write_file(&self, tmp: &Path, dataset: &Dataset, saved_at: DateTime<Utc>) -> DataResult<()> {
        let header = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
        };
        let body = SnapshotBodyRef {
            saved_at,
            teams: dataset.teams.iter().map(|(id, t)| (id.to_string(), t)).collect(),
            positions: dataset
                .positions
                .iter()
                .map(|(id, p)| (id.to_string(), p))
                .collect(),
            players: dataset
                .players
                .iter()
                .map(|(id, p)| (id.to_string(), p))
                .collect(),
            fixtures: &dataset.fixtures,
        };

        let file = File::create(tmp).map_err(|err| self.write_error(err))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        bincode::serialize_into(&mut encoder, &header).map_err(|err| self.write_error(err))?;
        bincode::serialize_into(&mut encoder, &body).map_err(|err| self.write_error(err))?;
        let mut writer = encoder.finish().map_err(|err| self.write_error(err))?;
        writer.flush().map_err(|err| self.write_error(err))?;
        let file = writer
            .into_inner()
            .map_err(|err| self.write_error(err.error()))?;
        file.sync_all().map_err(|err| self.write_error(err))?;
        Ok(())
    }

    /// Any problem reading the file is reported as `SnapshotUnavailable`.
    pub fn load(&self) -> DataResult<Snapshot> {
        let file = File::open(&self.path).map_err(|err| self.unavailable(err))?;
        let mut decoder = GzDecoder::new(BufReader::new(file));

        let header: SnapshotHeader =
            bincode::deserialize_from(&mut decoder).map_err(|err| self.unavailable(err))?;
        if header.magic != SNAPSHOT_MAGIC {
            return Err(self.unavailable("not a snapshot file"));
        }
        if header.version != SNAPSHOT_VERSION {
            return Err(self.unavailable(format!(
                "snapshot version {} (expected {SNAPSHOT_VERSION})",
                header.version
            )));
        }
        let body: SnapshotBody =
            bincode::deserialize_from(&mut decoder).map_err(|err| self.unavailable(err))?;

        let dataset = Dataset {
            teams: rekey(body.teams, |t| t.id).map_err(|reason| self.unavailable(reason))?,
            positions: rekey(body.positions, |p| p.id)
                .map_err(|reason| self.unavailable(reason))?,
            players: rekey(body.players, |p| p.id).map_err(|reason| self.unavailable(reason))?,
            fixtures: body.fixtures,
        };
        Ok(Snapshot {
            saved_at: body.saved_at,
            dataset,
        })
    }

    /// Like `load`, but a snapshot from an earlier day counts as unavailable.
    pub fn load_fresh(&self, today: NaiveDate) -> DataResult<Snapshot> {
        let snapshot = self.load()?;
        if !snapshot.is_fresh_on(today) {
            return Err(self.unavailable(format!(
                "stale snapshot from {}",
                snapshot.saved_at.with_timezone(&Local).date_naive()
            )));
        }
        Ok(snapshot)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> DataError {
        DataError::SnapshotUnavailable {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, err: impl std::fmt::Display) -> DataError {
        DataError::SnapshotWrite {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}

fn rekey<T>(entries: BTreeMap<String, T>, id_of: impl Fn(&T) -> u32) -> Result<BTreeMap<u32, T>, String> {
    let mut out = BTreeMap::new();
    for (key, value) in entries {
        let id = key
            .parse::<u32>()
            .map_err(|_| format!("invalid id key `{key}`"))?;
        if id != id_of(&value) {
            return Err(format!("key {key} does not match record id {}", id_of(&value)));
        }
        out.insert(id, value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn rekey_rejects_mismatched_ids() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "3".to_string(),
            Position {
                id: 4,
                name: "Forward".to_string(),
                short_name: "FWD".to_string(),
            },
        );
        assert!(rekey(entries, |p| p.id).is_err());
    }

    #[test]
    fn freshness_follows_local_calendar_day() {
        let saved_at = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        let snapshot = Snapshot {
            saved_at,
            dataset: Dataset::default(),
        };
        let local_day = saved_at.with_timezone(&Local).date_naive();
        assert!(snapshot.is_fresh_on(local_day));
        assert!(!snapshot.is_fresh_on(local_day.succ_opt().unwrap()));
    }

    #[test]
    fn tmp_path_sits_next_to_target() {
        let store = SnapshotStore::new("/tmp/x/data.bin");
        assert_eq!(store.tmp_path(), PathBuf::from("/tmp/x/data.bin.tmp"));
    }
}
