use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use color_eyre::eyre::{self, Context, ContextCompat};
use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    CURRENT_VERSION, MAGIC, MeshRecord, WorldTransform, read_f32, read_quat, read_vec3,
    write_f32, write_quat, write_string7, write_varint, write_vec3,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexSummary {
    pub record_count: u64,
    pub source_count: usize,
    pub shard_count: usize,
}

/// Spills record batches into numbered shard files, merged on
/// `finalize`. On failure the shards stay behind for diagnosis.
pub struct IndexWriter {
    output_path: PathBuf,
    temp_dir: PathBuf,
    shards: Vec<PathBuf>,
    total_records: u64,
    sources: FxHashSet<String>,
}

impl IndexWriter {
    pub fn create(output_path: &Path, temp_dir: &Path) -> eyre::Result<Self> {
        fs::create_dir_all(temp_dir)
            .wrap_err_with(|| format!("Failed to create temp dir: {}", temp_dir.display()))?;
        Ok(Self {
            output_path: output_path.to_path_buf(),
            temp_dir: temp_dir.to_path_buf(),
            shards: Vec::new(),
            total_records: 0,
            sources: FxHashSet::default(),
        })
    }

    pub fn record_count(&self) -> u64 {
        self.total_records
    }

    pub fn spill(&mut self, records: &[MeshRecord]) -> eyre::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let shard_path = self.temp_dir.join(format!("shard_{:05}.bin", self.shards.len()));
        let file = File::create(&shard_path)
            .wrap_err_with(|| format!("Failed to create shard: {}", shard_path.display()))?;
        let mut w = BufWriter::new(file);

        write_shard(&mut w, records)
            .wrap_err_with(|| format!("Failed to write shard: {}", shard_path.display()))?;
        w.flush()?;

        for record in records {
            self.sources.insert(record.source_path.clone());
        }
        self.total_records += records.len() as u64;
        self.shards.push(shard_path);
        log::debug!("spilled shard {} ({} records)", self.shards.len(), records.len());
        Ok(())
    }

    // record order is shard creation order; the source table is
    // sorted independently
    pub fn finalize(self) -> eyre::Result<IndexSummary> {
        let mut sources: Vec<String> = self.sources.iter().cloned().collect();
        sources.sort();
        let source_index: FxHashMap<&str, u64> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i as u64))
            .collect();

        let file = File::create(&self.output_path).wrap_err_with(|| {
            format!("Failed to create index: {}", self.output_path.display())
        })?;
        let mut w = BufWriter::new(file);

        w.write_all(MAGIC)?;
        write_varint(&mut w, CURRENT_VERSION)?;
        write_varint(&mut w, sources.len() as u64)?;
        for source in &sources {
            write_string7(&mut w, source)?;
        }
        write_varint(&mut w, self.total_records)?;

        let mut written = 0u64;
        for shard_path in &self.shards {
            let records = read_shard(shard_path)
                .wrap_err_with(|| format!("Failed to read shard: {}", shard_path.display()))?;
            for record in &records {
                let index = source_index
                    .get(record.source_path.as_str())
                    .copied()
                    .context("shard source missing from table")?;
                write_index_record(&mut w, index, record)?;
                written += 1;
            }
        }
        w.flush()?;

        if written != self.total_records {
            eyre::bail!(
                "shard merge wrote {written} records, expected {}",
                self.total_records
            );
        }

        let shard_count = self.shards.len();
        fs::remove_dir_all(&self.temp_dir)
            .wrap_err_with(|| format!("Failed to clean temp dir: {}", self.temp_dir.display()))?;

        Ok(IndexSummary {
            record_count: written,
            source_count: sources.len(),
            shard_count,
        })
    }
}

fn write_index_record<W: Write>(w: &mut W, source_index: u64, record: &MeshRecord) -> io::Result<()> {
    write_varint(w, source_index)?;
    write_string7(w, &record.name)?;
    write_string7(w, &record.prim_path)?;
    write_vec3(w, record.transform.position)?;
    write_quat(w, record.transform.rotation)?;
    write_vec3(w, record.transform.scale)?;
    let mut flags = 0u8;
    if record.has_skeleton {
        flags |= 1;
    }
    if record.extent.is_some() {
        flags |= 2;
    }
    w.write_all(&[flags])?;
    if let Some((min, max)) = record.extent {
        write_vec3(w, min)?;
        write_vec3(w, max)?;
    }
    Ok(())
}

// ---- transient shard codec (i32 length prefixes, little-endian) ----

fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn write_str32<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_i32(w, s.len() as i32)?;
    w.write_all(s.as_bytes())
}

fn read_str32<R: Read>(r: &mut R) -> io::Result<String> {
    let len = read_i32(r)?;
    if !(0..=(1 << 20)).contains(&len) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "shard string length out of range",
        ));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_shard<W: Write>(w: &mut W, records: &[MeshRecord]) -> io::Result<()> {
    write_i32(w, records.len() as i32)?;
    for record in records {
        write_str32(w, &record.source_path)?;
        write_str32(w, &record.name)?;
        write_str32(w, &record.prim_path)?;
        write_vec3(w, record.transform.position)?;
        write_quat(w, record.transform.rotation)?;
        write_vec3(w, record.transform.scale)?;
        // the skeleton flag rides along so finalize can set it in the
        // final record flags
        w.write_all(&[record.has_skeleton as u8])?;
        w.write_all(&[record.extent.is_some() as u8])?;
        if let Some((min, max)) = record.extent {
            write_vec3(w, min)?;
            write_vec3(w, max)?;
        }
    }
    Ok(())
}

pub(crate) fn read_shard(path: &Path) -> eyre::Result<Vec<MeshRecord>> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);
    let count = read_i32(&mut r)?;
    let mut records = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let source_path = read_str32(&mut r)?;
        let name = read_str32(&mut r)?;
        let prim_path = read_str32(&mut r)?;
        let position = read_vec3(&mut r)?;
        let rotation = read_quat(&mut r)?;
        let scale = read_vec3(&mut r)?;
        let mut flag = [0u8; 1];
        r.read_exact(&mut flag)?;
        let has_skeleton = flag[0] != 0;
        r.read_exact(&mut flag)?;
        let extent = if flag[0] != 0 {
            let min: Vec3 = read_vec3(&mut r)?;
            let max: Vec3 = read_vec3(&mut r)?;
            Some((min, max))
        } else {
            None
        };
        records.push(MeshRecord {
            source_path,
            name,
            prim_path,
            transform: WorldTransform {
                position,
                rotation,
                scale,
            },
            has_skeleton,
            extent,
        });
    }
    Ok(records)
}
