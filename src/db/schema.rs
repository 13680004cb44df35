pub const SCHEMA: &str = r#"
-- Photos: one row per photo, location of the original version inline
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY NOT NULL,
    time INTEGER NOT NULL,
    base_uri TEXT NOT NULL,
    filename TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    roll_id INTEGER NOT NULL DEFAULT 0,
    default_version_id INTEGER NOT NULL DEFAULT 1,
    rating INTEGER NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_roll_id ON photos(roll_id);
CREATE INDEX IF NOT EXISTS idx_photos_time ON photos(time);

-- Tag membership
CREATE TABLE IF NOT EXISTS photo_tags (
    photo_id INTEGER,
    tag_id INTEGER,
    UNIQUE (photo_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_photo_tags_tag_id ON photo_tags(tag_id);

-- Versions: the original (version_id 1) and derived edits
CREATE TABLE IF NOT EXISTS photo_versions (
    photo_id INTEGER,
    version_id INTEGER,
    name TEXT,
    base_uri TEXT NOT NULL,
    filename TEXT NOT NULL,
    import_md5 TEXT NULL,
    protected BOOLEAN,
    UNIQUE (photo_id, version_id)
);

CREATE INDEX IF NOT EXISTS idx_photo_versions_id ON photo_versions(photo_id);
CREATE INDEX IF NOT EXISTS idx_photo_versions_import_md5 ON photo_versions(import_md5);

-- Tags and categories; category_id 0 is the root
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT UNIQUE,
    category_id INTEGER,
    is_category BOOLEAN,
    sort_priority INTEGER,
    icon TEXT
);

-- Import batches
CREATE TABLE IF NOT EXISTS rolls (
    id INTEGER PRIMARY KEY NOT NULL,
    time INTEGER NOT NULL
);

-- Library-wide settings
CREATE TABLE IF NOT EXISTS meta (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    data TEXT
);
"#;

/// Statements for libraries created before a column existed. Failures
/// (column already present) are ignored.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE photos ADD COLUMN rating INTEGER NULL",
    "ALTER TABLE photo_versions ADD COLUMN import_md5 TEXT NULL",
    "ALTER TABLE photo_versions ADD COLUMN protected BOOLEAN",
];
