//! Backend qui expose une arborescence de fichiers.
//!
//! Les répertoires sont des conteneurs, les fichiers audio et vidéo des items.
//! L'identifiant `0` désigne la racine ; les autres sont dérivés du chemin
//! relatif et restent stables d'un scan à l'autre.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use parking_lot::RwLock;
use pmomount::{Authorizer, ChangeNotifier, MediaBackend, MediaItem, MediaResource, ResourceReader};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const ROOT_ID: &str = "0";

const COVER_NAMES: [&str; 3] = ["cover.jpg", "folder.jpg", "cover.png"];
const SUBTITLE_EXTENSIONS: [&str; 2] = ["srt", "vtt"];
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Type MIME d'un fichier selon son extension.
pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "srt" => "application/x-subrip",
        "vtt" => "text/vtt",
        _ => return None,
    };
    Some(mime)
}

fn is_playable(mime: &str) -> bool {
    mime.starts_with("audio/") || mime.starts_with("video/")
}

/// Identifiant stable d'un chemin relatif.
pub fn item_id(relative: &Path) -> String {
    let key = relative.to_string_lossy().replace('\\', "/");
    if key.is_empty() {
        return ROOT_ID.to_string();
    }
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
        .simple()
        .to_string()
}

/// Fichier sur disque servi tel quel.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
    mime: &'static str,
    size: u64,
    modified: Option<SystemTime>,
}

impl FileResource {
    fn stat(path: &Path) -> Option<Self> {
        let mime = mime_for(path)?;
        let meta = fs::metadata(path).ok()?;
        meta.is_file().then(|| Self {
            path: path.to_path_buf(),
            mime,
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

#[async_trait]
impl MediaResource for FileResource {
    fn content_type(&self) -> &str {
        self.mime
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    async fn open(&self) -> std::io::Result<Box<dyn ResourceReader>> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

#[derive(Debug)]
pub struct FolderItem {
    id: String,
    title: String,
    parent_id: Option<String>,
    children: Vec<Arc<dyn MediaItem>>,
    content: Option<Arc<FileResource>>,
    cover: Option<Arc<FileResource>>,
    subtitle: Option<Arc<FileResource>>,
    container: bool,
}

impl MediaItem for FolderItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn is_container(&self) -> bool {
        self.container
    }

    fn children(&self) -> Vec<Arc<dyn MediaItem>> {
        self.children.clone()
    }

    fn content(&self) -> Option<Arc<dyn MediaResource>> {
        self.content.clone().map(|c| c as Arc<dyn MediaResource>)
    }

    fn cover(&self) -> Option<Arc<dyn MediaResource>> {
        self.cover.clone().map(|c| c as Arc<dyn MediaResource>)
    }

    fn subtitle(&self) -> Option<Arc<dyn MediaResource>> {
        self.subtitle.clone().map(|c| c as Arc<dyn MediaResource>)
    }
}

/// Résultat d'un scan complet.
#[derive(Debug, Default)]
struct FolderTree {
    items: HashMap<String, Arc<FolderItem>>,
    /// Fichiers servis (contenus, couvertures, sous-titres) et répertoires, triés
    signature: Vec<Fingerprint>,
}

/// Chemin relatif, taille et date de modification.
type Fingerprint = (String, u64, Option<SystemTime>);

struct Scanner<'a> {
    root: &'a Path,
    tree: FolderTree,
}

impl Scanner<'_> {
    fn record(&mut self, resource: Option<&FileResource>) {
        if let Some(resource) = resource {
            let relative = resource.path.strip_prefix(self.root).unwrap_or(&resource.path);
            self.tree.signature.push((
                relative.to_string_lossy().into_owned(),
                resource.size,
                resource.modified,
            ));
        }
    }

    fn scan_dir(&mut self, dir: &Path, parent: Option<&str>) -> Result<Arc<FolderItem>> {
        let relative = dir.strip_prefix(self.root).unwrap_or(dir);
        let id = item_id(relative);

        let mut entries: Vec<(PathBuf, bool)> = fs::read_dir(dir)
            .with_context(|| format!("cannot read directory {}", dir.display()))?
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| {
                // Les liens symboliques vers des répertoires ne sont pas suivis
                let file_type = e.file_type().ok()?;
                Some((e.path(), file_type.is_dir()))
            })
            .collect();
        entries.sort_by(|(a, a_dir), (b, b_dir)| b_dir.cmp(a_dir).then_with(|| a.cmp(b)));

        let dir_cover = find_cover(dir);
        let mut children: Vec<Arc<dyn MediaItem>> = Vec::new();

        for (path, is_dir) in &entries {
            if *is_dir {
                match self.scan_dir(path, Some(id.as_str())) {
                    Ok(child) => children.push(child),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping directory"),
                }
                continue;
            }

            let Some(resource) = FileResource::stat(path) else {
                continue;
            };
            if !is_playable(resource.mime) {
                continue;
            }

            let child_rel = path.strip_prefix(self.root).unwrap_or(path);
            let child_id = item_id(child_rel);
            let subtitle = resource
                .mime
                .starts_with("video/")
                .then(|| sibling_with(path, &SUBTITLE_EXTENSIONS))
                .flatten();
            let cover = sibling_with(path, &IMAGE_EXTENSIONS).or_else(|| dir_cover.clone());

            self.record(Some(&resource));
            self.record(cover.as_deref());
            self.record(subtitle.as_deref());

            let item = Arc::new(FolderItem {
                id: child_id.clone(),
                title: display_name(path, true),
                parent_id: Some(id.clone()),
                children: Vec::new(),
                content: Some(Arc::new(resource)),
                cover,
                subtitle,
                container: false,
            });
            self.tree.items.insert(child_id, item.clone());
            children.push(item);
        }

        self.tree
            .signature
            .push((format!("{}/", relative.to_string_lossy()), 0, None));
        self.record(dir_cover.as_deref());

        let item = Arc::new(FolderItem {
            id: id.clone(),
            title: display_name(dir, false),
            parent_id: parent.map(str::to_string),
            children,
            content: None,
            cover: dir_cover,
            subtitle: None,
            container: true,
        });
        self.tree.items.insert(id, item.clone());
        Ok(item)
    }
}

fn display_name(path: &Path, strip_extension: bool) -> String {
    let name = if strip_extension {
        path.file_stem()
    } else {
        path.file_name()
    };
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn find_cover(dir: &Path) -> Option<Arc<FileResource>> {
    COVER_NAMES
        .iter()
        .find_map(|name| FileResource::stat(&dir.join(name)))
        .map(Arc::new)
}

/// Fichier voisin de même nom, avec l'une des extensions données.
fn sibling_with(path: &Path, extensions: &[&str]) -> Option<Arc<FileResource>> {
    extensions
        .iter()
        .find_map(|ext| FileResource::stat(&path.with_extension(ext)))
        .map(Arc::new)
}

fn scan(root: &Path, name: &str) -> Result<FolderTree> {
    let mut scanner = Scanner {
        root,
        tree: FolderTree::default(),
    };
    let root_item = scanner.scan_dir(root, None)?;

    // La racine porte le nom du backend
    let root_item = Arc::new(FolderItem {
        id: ROOT_ID.to_string(),
        title: name.to_string(),
        parent_id: None,
        children: root_item.children.clone(),
        content: None,
        cover: root_item.cover.clone(),
        subtitle: None,
        container: true,
    });
    scanner.tree.items.insert(ROOT_ID.to_string(), root_item);
    scanner.tree.signature.sort();
    scanner.tree.signature.dedup();
    Ok(scanner.tree)
}

/// Backend d'un répertoire de médias.
pub struct FolderBackend {
    root: PathBuf,
    name: String,
    uuid: Uuid,
    authorizer: Option<Arc<dyn Authorizer>>,
    tree: RwLock<Arc<FolderTree>>,
    notifier: ChangeNotifier,
}

impl FolderBackend {
    /// Ouvre et scanne `root`.
    pub fn open(root: impl Into<PathBuf>, name: Option<String>, uuid: Uuid) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }
        let name = name.unwrap_or_else(|| display_name(&root, false));
        let tree = scan(&root, &name)?;
        info!(
            path = %root.display(),
            name = %name,
            items = tree.items.len(),
            "Scanned media directory"
        );

        Ok(Self {
            root,
            name,
            uuid,
            authorizer: None,
            tree: RwLock::new(Arc::new(tree)),
            notifier: ChangeNotifier::new(),
        })
    }

    pub fn with_authorizer(mut self, authorizer: Option<Arc<dyn Authorizer>>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn item_count(&self) -> usize {
        self.tree.read().items.len()
    }

    /// Rescanne le répertoire ; notifie les abonnés si le contenu a changé.
    ///
    /// Retourne `true` si un changement a été détecté.
    pub fn rescan(&self) -> Result<bool> {
        let fresh = scan(&self.root, &self.name)?;

        let changed = {
            let mut tree = self.tree.write();
            if tree.signature == fresh.signature {
                false
            } else {
                *tree = Arc::new(fresh);
                true
            }
        };

        if changed {
            info!(path = %self.root.display(), "Media directory changed");
            self.notifier.notify();
        } else {
            debug!(path = %self.root.display(), "Media directory unchanged");
        }
        Ok(changed)
    }
}

impl MediaBackend for FolderBackend {
    fn friendly_name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn authorizer(&self) -> Option<Arc<dyn Authorizer>> {
        self.authorizer.clone()
    }

    fn get_item(&self, id: &str) -> Option<Arc<dyn MediaItem>> {
        self.tree
            .read()
            .items
            .get(id)
            .map(|item| item.clone() as Arc<dyn MediaItem>)
    }

    fn change_notifier(&self) -> Option<&ChangeNotifier> {
        Some(&self.notifier)
    }
}
