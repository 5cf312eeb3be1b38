use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::SystemTime;

use crate::error::RendererError;
use crate::renderer::driver::{Driver, FramebufferId, ShaderId};
use crate::renderer::framebuffer::{Framebuffer, FramebufferSpec};

/// Content identity of one shader module: canonical source path plus
/// its modification time. Editing the file on disk changes the key,
/// so stale cache entries invalidate themselves without an explicit
/// call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderKey {
    path: PathBuf,
    mtime: SystemTime,
}

impl ShaderKey {
    /// Unreadable sources get `UNIX_EPOCH` as a sentinel so the key
    /// stays stable and creation is attempted (and fails loudly)
    /// instead of silently reusing a stale entry.
    fn probe(path: &Path) -> Self {
        let mtime = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        Self {
            path: path.to_path_buf(),
            mtime,
        }
    }
}

/// Compiled shader module. Consumers share it by `Arc`; the factory
/// holds only a weak entry, so dropping the last strong reference
/// retires the GPU object for the next `reclaim` sweep.
pub struct Shader {
    id: ShaderId,
    key: ShaderKey,
    disposed: AtomicBool,
    retire: RetireQueue,
}

impl Shader {
    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.key.path
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::Acquire) {
            if let Ok(mut retired) = self.retire.lock() {
                retired.push(Retired::Shader(self.id));
            }
        }
    }
}

/// GPU ids whose last external reference is gone; destroyed on the
/// next `reclaim`. The explicit ownership signal that replaces a
/// garbage collector's weak-reference reclamation.
pub(crate) enum Retired {
    Shader(ShaderId),
    Framebuffer(FramebufferId),
}

pub(crate) type RetireQueue = Arc<Mutex<Vec<Retired>>>;

/// Idempotent creation of shaders and framebuffers, cached by content
/// identity. One lock guards each lookup-or-create decision; the lock
/// is never held across the (possibly slow) GPU creation call, so
/// insertion re-checks the map and discards the redundant object when
/// a concurrent caller won the race.
pub struct ResourceFactory {
    shaders: Mutex<HashMap<ShaderKey, Weak<Shader>>>,
    framebuffers: Mutex<HashMap<FramebufferSpec, Weak<Framebuffer>>>,
    retired: RetireQueue,
}

impl ResourceFactory {
    pub fn new() -> Self {
        Self {
            shaders: Mutex::new(HashMap::new()),
            framebuffers: Mutex::new(HashMap::new()),
            retired: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the cached shader for this (path, mtime) identity, or
    /// compiles and inserts it. Two calls with an unchanged file
    /// return the same instance; touching the file yields a new one.
    pub fn get_or_create_shader(
        &self,
        driver: &mut dyn Driver,
        path: impl AsRef<Path>,
    ) -> Result<Arc<Shader>, RendererError> {
        let key = ShaderKey::probe(path.as_ref());

        if let Some(alive) = self
            .shaders
            .lock()
            .unwrap()
            .get(&key)
            .and_then(Weak::upgrade)
        {
            return Ok(alive);
        }

        // Compile outside the lock.
        let source = fs::read_to_string(&key.path).map_err(|source| RendererError::SourceIo {
            path: key.path.clone(),
            source,
        })?;
        let label = key.path.display().to_string();
        let id = driver.create_shader(&label, &source)?;

        let mut shaders = self.shaders.lock().unwrap();
        if let Some(existing) = shaders.get(&key).and_then(Weak::upgrade) {
            // A concurrent caller inserted the same key first; drop
            // our duplicate GPU object rather than racing destruction
            // later.
            driver.destroy_shader(id);
            return Ok(existing);
        }

        log::info!("compiled shader {label}");
        let shader = Arc::new(Shader {
            id,
            key: key.clone(),
            disposed: AtomicBool::new(false),
            retire: self.retired.clone(),
        });
        shaders.insert(key, Arc::downgrade(&shader));
        Ok(shader)
    }

    /// Compiles a shader from in-memory source, bypassing the cache.
    /// For generated sources that have no file identity.
    pub fn create_shader_from_source(
        &self,
        driver: &mut dyn Driver,
        label: &str,
        source: &str,
    ) -> Result<Arc<Shader>, RendererError> {
        let id = driver.create_shader(label, source)?;
        Ok(Arc::new(Shader {
            id,
            key: ShaderKey {
                path: PathBuf::from(label),
                mtime: SystemTime::UNIX_EPOCH,
            },
            disposed: AtomicBool::new(false),
            retire: self.retired.clone(),
        }))
    }

    /// Returns the cached framebuffer for this spec or creates it.
    pub fn get_or_create_framebuffer(
        &self,
        driver: &mut dyn Driver,
        spec: &FramebufferSpec,
    ) -> Result<Arc<Framebuffer>, RendererError> {
        if let Some(alive) = self
            .framebuffers
            .lock()
            .unwrap()
            .get(spec)
            .and_then(Weak::upgrade)
        {
            return Ok(alive);
        }

        let framebuffer = Framebuffer::create(driver, spec, self.retired.clone())?;

        let mut framebuffers = self.framebuffers.lock().unwrap();
        if let Some(existing) = framebuffers.get(spec).and_then(Weak::upgrade) {
            framebuffer.mark_disposed();
            driver.destroy_framebuffer(framebuffer.id());
            return Ok(existing);
        }

        let framebuffer = Arc::new(framebuffer);
        framebuffers.insert(spec.clone(), Arc::downgrade(&framebuffer));
        Ok(framebuffer)
    }

    /// Destroys GPU objects whose last strong reference has been
    /// dropped and prunes dead cache entries. Cheap; call once per
    /// frame or at loading boundaries.
    pub fn reclaim(&self, driver: &mut dyn Driver) {
        let retired: Vec<Retired> = self.retired.lock().unwrap().drain(..).collect();
        for entry in retired {
            match entry {
                Retired::Shader(id) => driver.destroy_shader(id),
                Retired::Framebuffer(id) => driver.destroy_framebuffer(id),
            }
        }
        self.shaders
            .lock()
            .unwrap()
            .retain(|_, weak| weak.strong_count() > 0);
        self.framebuffers
            .lock()
            .unwrap()
            .retain(|_, weak| weak.strong_count() > 0);
    }

    /// Forcibly disposes every live entry; outstanding handles become
    /// stale and must not be used afterwards. For full resource
    /// reloads.
    pub fn clear_cache(&self, driver: &mut dyn Driver) {
        {
            let mut shaders = self.shaders.lock().unwrap();
            for weak in shaders.values() {
                if let Some(shader) = weak.upgrade() {
                    shader.disposed.store(true, Ordering::Release);
                    driver.destroy_shader(shader.id);
                }
            }
            shaders.clear();
        }
        {
            let mut framebuffers = self.framebuffers.lock().unwrap();
            for weak in framebuffers.values() {
                if let Some(framebuffer) = weak.upgrade() {
                    framebuffer.mark_disposed();
                    driver.destroy_framebuffer(framebuffer.id());
                }
            }
            framebuffers.clear();
        }
        self.reclaim(driver);
    }
}

impl Default for ResourceFactory {
    fn default() -> Self {
        Self::new()
    }
}
