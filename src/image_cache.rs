//! Content-addressed image cache with a background decoder.
//!
//! Images are keyed by the MD5 of their file bytes. Decoded pixmaps live in
//! memory; a verbatim copy of each source file is mirrored into the cache
//! directory as `<hash><ext>`. Decoding runs on a worker thread and results are
//! handed back to the UI thread by [`ImageCache::poll`], which fills the slots
//! of every subscriber waiting on that hash.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use thiserror::Error;

use crate::pixmap::Pixmap;

const HASH_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image loader is not running")]
    LoaderStopped,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Result delivered to a subscriber. Errors are reduced to a message since
/// one decode may be fanned out to many strokes.
pub type LoadOutcome = Result<Pixmap, String>;

/// Where a finished load is written for its subscriber.
pub type ImageSlot = Arc<Mutex<Option<LoadOutcome>>>;

/// MD5 of the file contents, lower-case hex. Read in 4 KiB chunks.
pub fn file_hash(path: &Path) -> CacheResult<String> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Decode synchronously.
pub fn decode_image(path: &Path) -> CacheResult<Pixmap> {
    image::open(path)
        .map(Pixmap::from_dynamic)
        .map_err(|source| match source {
            image::ImageError::IoError(source) => CacheError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => CacheError::Decode {
                path: path.to_path_buf(),
                source,
            },
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: usize,
    pub in_flight: usize,
    pub subscribers: usize,
    pub decodes: usize,
}

struct Job {
    hash: String,
    source: PathBuf,
    mirror: PathBuf,
    max_extent: Option<u32>,
}

struct Completion {
    hash: String,
    outcome: LoadOutcome,
}

struct Subscriber {
    id: u64,
    hash: String,
    slot: Weak<Mutex<Option<LoadOutcome>>>,
}

#[derive(Default)]
struct Index {
    pixmaps: HashMap<String, Pixmap>,
    sources: HashMap<String, PathBuf>,
    in_flight: HashSet<String>,
    subscribers: Vec<Subscriber>,
}

struct Shared {
    index: Mutex<Index>,
    completions: Mutex<UnboundedReceiver<Completion>>,
    next_subscription: AtomicU64,
    decodes: Arc<AtomicUsize>,
}

impl Shared {
    fn subscribe(self: &Arc<Self>, hash: &str, slot: &ImageSlot) -> Option<Subscription> {
        let mut index = self.index.lock();
        if let Some(pixmap) = index.pixmaps.get(hash) {
            *slot.lock() = Some(Ok(pixmap.clone()));
            return None;
        }
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        index.subscribers.push(Subscriber {
            id,
            hash: hash.to_string(),
            slot: Arc::downgrade(slot),
        });
        Some(Subscription {
            id,
            hash: hash.to_string(),
            shared: Arc::downgrade(self),
        })
    }
}

/// Interest in one pending hash. Dropping it unsubscribes, so a stroke that is
/// destroyed before its image arrives is never called back.
pub struct Subscription {
    id: u64,
    hash: String,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Subscribe another slot to the same hash, e.g. for a copied stroke.
    pub fn resubscribe(&self, slot: &ImageSlot) -> Option<Subscription> {
        self.shared.upgrade()?.subscribe(&self.hash, slot)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.index.lock().subscribers.retain(|s| s.id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("hash", &self.hash)
            .finish()
    }
}

/// Process-wide image store. Clones share the same cache and worker.
#[derive(Clone)]
pub struct ImageCache {
    cache_dir: PathBuf,
    shared: Arc<Shared>,
    jobs: UnboundedSender<Job>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("cache_dir", &self.cache_dir)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ImageCache {
    /// Create the cache directory if needed and start the decoder thread.
    pub fn new(cache_dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|source| CacheError::Io {
            path: cache_dir.clone(),
            source,
        })?;

        let (jobs, job_rx) = mpsc::unbounded::<Job>();
        let (done_tx, done_rx) = mpsc::unbounded::<Completion>();
        let decodes = Arc::new(AtomicUsize::new(0));

        let worker_decodes = decodes.clone();
        thread::Builder::new()
            .name("image-loader".into())
            .spawn(move || run_worker(job_rx, done_tx, worker_decodes))
            .map_err(|source| CacheError::Io {
                path: cache_dir.clone(),
                source,
            })?;

        log::info!("Image cache at {}", cache_dir.display());
        Ok(Self {
            cache_dir,
            shared: Arc::new(Shared {
                index: Mutex::new(Index::default()),
                completions: Mutex::new(done_rx),
                next_subscription: AtomicU64::new(1),
                decodes,
            }),
            jobs,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Mirror location for `hash`, keeping the source's extension.
    pub fn mirror_path(&self, hash: &str, source: &Path) -> PathBuf {
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.cache_dir.join(format!("{hash}{ext}"))
    }

    /// Hash `path` and schedule a decode unless the pixmap is already cached
    /// or being decoded. `max_extent` downsizes larger images before they are
    /// stored; the first request for a hash decides.
    pub fn cache_image(&self, path: &Path, max_extent: Option<u32>) -> CacheResult<String> {
        let hash = file_hash(path)?;
        self.cache_known(&hash, path, max_extent)?;
        Ok(hash)
    }

    /// Like [`Self::cache_image`] for a hash recorded earlier. The source path
    /// may be gone as long as the mirror is still present.
    pub fn cache_known(&self, hash: &str, path: &Path, max_extent: Option<u32>) -> CacheResult<()> {
        let mut index = self.shared.index.lock();
        index.sources.insert(hash.to_string(), path.to_path_buf());
        if index.pixmaps.contains_key(hash) || index.in_flight.contains(hash) {
            return Ok(());
        }
        let job = Job {
            hash: hash.to_string(),
            source: path.to_path_buf(),
            mirror: self.mirror_path(hash, path),
            max_extent,
        };
        self.jobs
            .unbounded_send(job)
            .map_err(|_| CacheError::LoaderStopped)?;
        index.in_flight.insert(hash.to_string());
        log::debug!("Queued decode of {} ({hash})", path.display());
        Ok(())
    }

    /// Register `slot` for `hash`. A cached pixmap is written immediately and
    /// no subscription is returned.
    pub fn subscribe(&self, hash: &str, slot: &ImageSlot) -> Option<Subscription> {
        self.shared.subscribe(hash, slot)
    }

    pub fn get(&self, hash: &str) -> Option<Pixmap> {
        self.shared.index.lock().pixmaps.get(hash).cloned()
    }

    pub fn source_path(&self, hash: &str) -> Option<PathBuf> {
        self.shared.index.lock().sources.get(hash).cloned()
    }

    /// Deliver finished decodes. Call from the UI thread; returns the number
    /// of slots filled. Repeated results for a hash already cached are dropped.
    pub fn poll(&self) -> usize {
        let mut completions = Vec::new();
        {
            let mut rx = self.shared.completions.lock();
            while let Ok(Some(done)) = rx.try_next() {
                completions.push(done);
            }
        }

        let mut delivered = 0;
        let mut index = self.shared.index.lock();
        for Completion { hash, outcome } in completions {
            index.in_flight.remove(&hash);
            let outcome = match outcome {
                Ok(pixmap) => Ok(index.pixmaps.entry(hash.clone()).or_insert(pixmap).clone()),
                Err(message) => {
                    log::warn!("Image {hash} failed to load: {message}");
                    Err(message)
                }
            };
            index.subscribers.retain(|sub| {
                if sub.hash != hash {
                    return true;
                }
                if let Some(slot) = sub.slot.upgrade() {
                    *slot.lock() = Some(outcome.clone());
                    delivered += 1;
                }
                false
            });
        }
        delivered
    }

    /// Poll until nothing is in flight or `timeout` passes. Returns true when idle.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if self.shared.index.lock().in_flight.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Drop one pixmap from memory. Strokes holding it keep their copy.
    pub fn evict(&self, hash: &str) -> bool {
        self.shared.index.lock().pixmaps.remove(hash).is_some()
    }

    pub fn clear_memory(&self) {
        self.shared.index.lock().pixmaps.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.shared.index.lock();
        CacheStats {
            cached: index.pixmaps.len(),
            in_flight: index.in_flight.len(),
            subscribers: index.subscribers.len(),
            decodes: self.shared.decodes.load(Ordering::SeqCst),
        }
    }
}

fn run_worker(
    mut jobs: UnboundedReceiver<Job>,
    done: UnboundedSender<Completion>,
    decodes: Arc<AtomicUsize>,
) {
    futures::executor::block_on(async move {
        while let Some(job) = jobs.next().await {
            let outcome = load_job(&job).map_err(|err| err.to_string());
            decodes.fetch_add(1, Ordering::SeqCst);
            if done
                .unbounded_send(Completion {
                    hash: job.hash,
                    outcome,
                })
                .is_err()
            {
                break;
            }
        }
    });
    log::debug!("Image loader stopped");
}

fn load_job(job: &Job) -> CacheResult<Pixmap> {
    if !job.mirror.exists() && job.source.exists() {
        if let Err(err) = fs::copy(&job.source, &job.mirror) {
            log::warn!(
                "Could not mirror {} into the cache: {err}",
                job.source.display()
            );
        }
    }
    let path = if job.mirror.exists() {
        &job.mirror
    } else {
        &job.source
    };
    let pixmap = decode_image(path)?;
    Ok(match job.max_extent {
        Some(max) if pixmap.width() > max || pixmap.height() > max => {
            let fitted = crate::geometry::fit_within(pixmap.size(), max as f32);
            Pixmap::new(pixmap.scaled(fitted.x.round() as u32, fitted.y.round() as u32))
        }
        _ => pixmap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, color: [u8; 4]) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(8, 6, Rgba(color)).save(&path).unwrap();
        path
    }

    #[test]
    fn test_hash_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", [1, 2, 3, 255]);
        let b = dir.path().join("b.png");
        fs::copy(&a, &b).unwrap();
        let ha = file_hash(&a).unwrap();
        assert_eq!(ha, file_hash(&b).unwrap());
        assert_eq!(ha.len(), 32);
    }

    #[test]
    fn test_known_md5() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(file_hash(&path).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_subscription_filled_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path(), "img.png", [9, 9, 9, 255]);
        let cache = ImageCache::new(dir.path().join("cache")).unwrap();
        let hash = cache.cache_image(&png, None).unwrap();
        let slot = ImageSlot::default();
        let sub = cache.subscribe(&hash, &slot);
        assert!(cache.flush(Duration::from_secs(5)));
        let filled = slot.lock().take().unwrap().unwrap();
        assert_eq!((filled.width(), filled.height()), (8, 6));
        assert_eq!(cache.stats().subscribers, 0);
        assert!(cache.mirror_path(&hash, &png).exists());
        drop(sub);
    }

    #[test]
    fn test_dropped_subscription_is_not_called_back() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path(), "img.png", [9, 9, 9, 255]);
        let cache = ImageCache::new(dir.path().join("cache")).unwrap();
        let hash = cache.cache_image(&png, None).unwrap();
        let slot = ImageSlot::default();
        let sub = cache.subscribe(&hash, &slot);
        assert!(sub.is_some());
        drop(sub);
        assert_eq!(cache.stats().subscribers, 0);
        assert!(cache.flush(Duration::from_secs(5)));
        assert!(slot.lock().is_none());
        assert!(cache.get(&hash).is_some());
    }

    #[test]
    fn test_evicted_pixmap_survives_in_holder() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path(), "img.png", [50, 60, 70, 255]);
        let cache = ImageCache::new(dir.path().join("cache")).unwrap();
        let hash = cache.cache_image(&png, None).unwrap();
        assert!(cache.flush(Duration::from_secs(5)));
        let held = cache.get(&hash).unwrap();
        assert!(cache.evict(&hash));
        assert!(cache.get(&hash).is_none());
        assert_eq!(held.image().get_pixel(0, 0)[0], 50);
    }

    #[test]
    fn test_missing_mirror_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path(), "img.png", [1, 1, 1, 255]);
        let cache = ImageCache::new(dir.path().join("cache")).unwrap();
        let hash = cache.cache_image(&png, None).unwrap();
        assert!(cache.flush(Duration::from_secs(5)));
        let mirror = cache.mirror_path(&hash, &png);
        fs::remove_file(&mirror).unwrap();
        cache.clear_memory();
        cache.cache_image(&png, None).unwrap();
        assert!(cache.flush(Duration::from_secs(5)));
        assert!(mirror.exists());
        assert_eq!(cache.stats().decodes, 2);
    }
}
