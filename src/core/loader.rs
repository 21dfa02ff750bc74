//! Asynchronous texture loading.
//!
//! Fetches are driven by a single-threaded [`LocalPool`] that the render loop
//! polls once per frame with [`ResourceLoader::poll`]; nothing blocks. Each
//! completion bumps a shared counter, and the loader hands over the decoded
//! images the first time `completed + failed` reaches the number requested.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use thiserror::Error;

use crate::config::TextureConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read texture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture load for {url} was interrupted")]
    Interrupted { url: String },
    #[error("failed to spawn texture task: {0}")]
    Spawn(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRole {
    SurfaceDay,
    SurfaceNight,
    CloudCover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed,
}

/// Tightly packed RGBA8 pixels
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

impl DecodedImage {
    /// Single-pixel image, used by tests and as a stand-in before loading
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: rgba.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRequest {
    pub role: TextureRole,
    pub url: String,
}

/// The three surface textures, in load order
pub fn texture_requests(config: &TextureConfig) -> Vec<TextureRequest> {
    [
        (TextureRole::SurfaceDay, &config.day),
        (TextureRole::SurfaceNight, &config.night),
        (TextureRole::CloudCover, &config.clouds),
    ]
    .into_iter()
    .map(|(role, name)| TextureRequest {
        role,
        url: config.base_path.join(name).to_string_lossy().into_owned(),
    })
    .collect()
}

/// One texture as tracked by the loader
#[derive(Debug, Clone)]
pub struct TextureResource {
    pub role: TextureRole,
    pub url: String,
    pub state: LoadState,
    pub image: Option<DecodedImage>,
}

/// Where texture bytes come from
pub trait TextureSource {
    /// Start fetching `url`. The returned future resolves on the loader's pool.
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<DecodedImage, LoadError>>;
}

/// Reads and decodes image files off the render thread
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTextureSource;

impl FileTextureSource {
    fn read(path: PathBuf) -> Result<DecodedImage, LoadError> {
        let bytes = std::fs::read(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| LoadError::Decode { path, source })?
            .to_rgba8();
        Ok(DecodedImage {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        })
    }
}

impl TextureSource for FileTextureSource {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<DecodedImage, LoadError>> {
        let (sender, receiver) = oneshot::channel();
        let path = PathBuf::from(url);
        let spawned = std::thread::Builder::new()
            .name("texture-read".to_string())
            .spawn(move || {
                // The receiver is gone if the loader was cancelled
                let _ = sender.send(Self::read(path));
            });
        if let Err(err) = spawned {
            return future::ready(Err(LoadError::Spawn(err.to_string()))).boxed_local();
        }

        let url = url.to_string();
        receiver
            .map(move |result| result.unwrap_or(Err(LoadError::Interrupted { url })))
            .boxed_local()
    }
}

/// What the scene builder receives once every load has resolved
#[derive(Debug, Default)]
pub struct LoadedTextures {
    pub day: Option<DecodedImage>,
    pub night: Option<DecodedImage>,
    pub clouds: Option<DecodedImage>,
    pub failed: usize,
}

#[derive(Debug)]
struct Progress {
    resources: Vec<TextureResource>,
    completed: usize,
    failed: usize,
}

impl Progress {
    fn resolved(&self) -> usize {
        self.completed + self.failed
    }
}

pub struct ResourceLoader {
    pool: LocalPool,
    progress: Rc<RefCell<Progress>>,
    alive: Rc<Cell<bool>>,
    ready_fired: bool,
}

impl ResourceLoader {
    /// Request every texture once. A request that cannot be started counts as failed.
    pub fn start(source: &dyn TextureSource, requests: Vec<TextureRequest>) -> Self {
        let resources = requests
            .iter()
            .map(|request| TextureResource {
                role: request.role,
                url: request.url.clone(),
                state: LoadState::Pending,
                image: None,
            })
            .collect();
        let progress = Rc::new(RefCell::new(Progress {
            resources,
            completed: 0,
            failed: 0,
        }));
        let alive = Rc::new(Cell::new(true));
        let pool = LocalPool::new();
        let spawner = pool.spawner();

        for (index, request) in requests.into_iter().enumerate() {
            log::debug!("requesting texture {}", request.url);
            let fetch = source.fetch(&request.url);
            let task = Self::completion(index, fetch, Rc::clone(&progress), Rc::clone(&alive));
            if let Err(err) = spawner.spawn_local(task) {
                Self::record(
                    &progress,
                    index,
                    Err(LoadError::Spawn(err.to_string())),
                );
            }
        }

        Self {
            pool,
            progress,
            alive,
            ready_fired: false,
        }
    }

    async fn completion(
        index: usize,
        fetch: LocalBoxFuture<'static, Result<DecodedImage, LoadError>>,
        progress: Rc<RefCell<Progress>>,
        alive: Rc<Cell<bool>>,
    ) {
        let result = fetch.await;
        if !alive.get() {
            log::debug!("texture resolved after teardown, ignoring");
            return;
        }
        Self::record(&progress, index, result);
    }

    fn record(progress: &RefCell<Progress>, index: usize, result: Result<DecodedImage, LoadError>) {
        let mut progress = progress.borrow_mut();
        let total = progress.resources.len();
        match result {
            Ok(image) => {
                progress.completed += 1;
                let done = progress.resolved();
                let resource = &mut progress.resources[index];
                log::info!(
                    "texture {:?} loaded {}x{} ({}/{})",
                    resource.role,
                    image.width,
                    image.height,
                    done,
                    total
                );
                resource.state = LoadState::Loaded;
                resource.image = Some(image);
            }
            Err(err) => {
                progress.failed += 1;
                let done = progress.resolved();
                let resource = &mut progress.resources[index];
                log::warn!("texture {:?} failed ({}/{}): {}", resource.role, done, total, err);
                resource.state = LoadState::Failed;
            }
        }
    }

    /// Drive pending fetches without blocking. Returns the textures exactly once,
    /// on the first poll after every request has resolved.
    pub fn poll(&mut self) -> Option<LoadedTextures> {
        if self.ready_fired || !self.alive.get() {
            return None;
        }
        self.pool.run_until_stalled();

        let mut progress = self.progress.borrow_mut();
        if progress.resolved() < progress.resources.len() {
            return None;
        }
        self.ready_fired = true;

        let mut loaded = LoadedTextures {
            failed: progress.failed,
            ..LoadedTextures::default()
        };
        for resource in progress.resources.iter_mut() {
            let image = resource.image.take();
            match resource.role {
                TextureRole::SurfaceDay => loaded.day = image,
                TextureRole::SurfaceNight => loaded.night = image,
                TextureRole::CloudCover => loaded.clouds = image,
            }
        }
        log::info!(
            "resources ready: {} loaded, {} failed",
            progress.completed,
            progress.failed
        );
        Some(loaded)
    }

    pub fn is_ready(&self) -> bool {
        self.ready_fired
    }

    pub fn state(&self, role: TextureRole) -> Option<LoadState> {
        self.progress
            .borrow()
            .resources
            .iter()
            .find(|resource| resource.role == role)
            .map(|resource| resource.state)
    }

    /// (completed, failed)
    pub fn counts(&self) -> (usize, usize) {
        let progress = self.progress.borrow();
        (progress.completed, progress.failed)
    }

    /// Stop reacting to completions. Safe to call more than once.
    pub fn cancel(&mut self) {
        if self.alive.replace(false) {
            log::debug!("texture loading cancelled");
        }
    }
}

impl Drop for ResourceLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}
