// Cache row CRUD, last-accessed touch, expiry sweep, paginated search.

use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::error::CoreResult;
use crate::types::{AvailableLanguages, CacheFilter, CachedTranslation};

use super::Store;

/// Fields supplied on an upsert. `provider` here is always the *translation*
/// tier's name, never the refinement provider (per pipeline §4.7).
pub struct UpsertFields<'a> {
    pub source_lang: &'a str,
    pub target_lang: &'a str,
    pub original_text: &'a str,
    pub translated_text: &'a str,
    pub provider: &'a str,
    pub is_refined: bool,
    pub refinement_model: Option<&'a str>,
}

pub struct CacheRepo<'a> {
    store: &'a Store,
}

impl<'a> CacheRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Returns `None` when the row is absent *or* expired.
    pub fn get(&self, key: &str) -> CoreResult<Option<CachedTranslation>> {
        let conn = self.store.conn.lock();
        let row = conn
            .query_row(
                "SELECT cache_key, source_lang, target_lang, original_text, translated_text,
                        provider, is_refined, refinement_model, char_count,
                        created_at, last_accessed_at, expires_at
                 FROM translations
                 WHERE cache_key = ?1
                   AND (expires_at IS NULL OR expires_at > CURRENT_TIMESTAMP)",
                params![key],
                row_to_cached_translation,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert-or-update: on collision, overwrites translated text, provider,
    /// refined flag, refinement model, and bumps last-accessed-at to now.
    /// `created_at` is preserved across the update.
    pub fn upsert(&self, key: &str, fields: UpsertFields<'_>) -> CoreResult<()> {
        let conn = self.store.conn.lock();
        let char_count = fields.original_text.chars().count() as i64;
        conn.execute(
            "INSERT INTO translations (
                cache_key, source_lang, target_lang, original_text, translated_text,
                provider, is_refined, refinement_model, char_count,
                created_at, last_accessed_at, expires_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, NULL)
             ON CONFLICT(cache_key) DO UPDATE SET
                translated_text = excluded.translated_text,
                provider = excluded.provider,
                is_refined = excluded.is_refined,
                refinement_model = excluded.refinement_model,
                last_accessed_at = CURRENT_TIMESTAMP",
            params![
                key,
                fields.source_lang,
                fields.target_lang,
                fields.original_text,
                fields.translated_text,
                fields.provider,
                fields.is_refined as i64,
                fields.refinement_model,
                char_count,
            ],
        )?;
        Ok(())
    }

    /// Update last-accessed-at to now; silent if the row is absent.
    pub fn touch(&self, key: &str) -> CoreResult<()> {
        let conn = self.store.conn.lock();
        conn.execute(
            "UPDATE translations SET last_accessed_at = CURRENT_TIMESTAMP WHERE cache_key = ?1",
            params![key],
        )?;
        Ok(())
    }

    /// Delete rows whose last-accessed-at is older than `now - days`. Zero
    /// is legal and deletes all rows; returns the number deleted.
    pub fn delete_expired(&self, days: u32) -> CoreResult<usize> {
        let conn = self.store.conn.lock();
        let offset = format!("-{days} days");
        let count = conn.execute(
            "DELETE FROM translations WHERE last_accessed_at < datetime('now', ?1)",
            params![offset],
        )?;
        Ok(count)
    }

    /// Count rows that would be deleted by [`Self::delete_expired`] without
    /// deleting them (used by the cleanup CLI's `--dry-run`).
    pub fn count_expired(&self, days: u32) -> CoreResult<usize> {
        let conn = self.store.conn.lock();
        let offset = format!("-{days} days");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM translations WHERE last_accessed_at < datetime('now', ?1)",
            params![offset],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Filtered, paginated listing. Page size clamps to [1, 100]; page index
    /// is 1-based. Returns (items, total matching rows across all pages).
    pub fn paginated(&self, filter: &CacheFilter) -> CoreResult<(Vec<CachedTranslation>, i64)> {
        let conn = self.store.conn.lock();

        let mut conditions: Vec<String> = Vec::new();
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(q) = &filter.search_query {
            let idx = sql_params.len() + 1;
            conditions.push(format!("(original_text LIKE ?{idx} OR translated_text LIKE ?{idx})"));
            sql_params.push(Box::new(format!("%{q}%")));
        }

        if let Some(providers) = &filter.providers {
            if !providers.is_empty() {
                let start = sql_params.len() + 1;
                let placeholders: Vec<String> =
                    (0..providers.len()).map(|i| format!("?{}", start + i)).collect();
                conditions.push(format!("provider IN ({})", placeholders.join(",")));
                for p in providers {
                    sql_params.push(Box::new(p.clone()));
                }
            }
        }

        if let Some(src) = &filter.source_lang {
            let idx = sql_params.len() + 1;
            conditions.push(format!("source_lang = ?{idx}"));
            sql_params.push(Box::new(src.clone()));
        }

        if let Some(tgt) = &filter.target_lang {
            let idx = sql_params.len() + 1;
            conditions.push(format!("target_lang = ?{idx}"));
            sql_params.push(Box::new(tgt.clone()));
        }

        if let Some(refined) = filter.is_refined {
            let idx = sql_params.len() + 1;
            conditions.push(format!("is_refined = ?{idx}"));
            sql_params.push(Box::new(refined as i64));
        }

        let where_clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };

        let page_size = filter.page_size.clamp(1, 100);
        let page = filter.page.max(1);
        let offset = (page - 1) as i64 * page_size as i64;

        let count_sql = format!("SELECT COUNT(*) FROM translations WHERE {where_clause}");
        let total: i64 = conn.query_row(&count_sql, params_from_iter(sql_params.iter().map(|b| b.as_ref())), |row| row.get(0))?;

        let limit_idx = sql_params.len() + 1;
        let offset_idx = sql_params.len() + 2;
        let data_sql = format!(
            "SELECT cache_key, source_lang, target_lang, original_text, translated_text,
                    provider, is_refined, refinement_model, char_count,
                    created_at, last_accessed_at, expires_at
             FROM translations WHERE {where_clause}
             ORDER BY created_at DESC
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
        );

        let mut stmt = conn.prepare(&data_sql)?;
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = sql_params;
        bound.push(Box::new(page_size as i64));
        bound.push(Box::new(offset));

        let rows = stmt.query_map(params_from_iter(bound.iter().map(|b| b.as_ref())), row_to_cached_translation)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok((items, total))
    }

    /// Distinct source/target language codes, each sorted ascending.
    pub fn languages(&self) -> CoreResult<AvailableLanguages> {
        let conn = self.store.conn.lock();

        let mut stmt = conn.prepare("SELECT DISTINCT source_lang FROM translations ORDER BY source_lang")?;
        let source_languages: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let mut stmt = conn.prepare("SELECT DISTINCT target_lang FROM translations ORDER BY target_lang")?;
        let target_languages: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        Ok(AvailableLanguages { source_languages, target_languages })
    }
}

fn row_to_cached_translation(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedTranslation> {
    Ok(CachedTranslation {
        cache_key: row.get(0)?,
        source_lang: row.get(1)?,
        target_lang: row.get(2)?,
        original_text: row.get(3)?,
        translated_text: row.get(4)?,
        provider: row.get(5)?,
        is_refined: row.get::<_, i64>(6)? != 0,
        refinement_model: row.get(7)?,
        char_count: row.get(8)?,
        created_at: row.get(9)?,
        last_accessed_at: row.get(10)?,
        expires_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> UpsertFields<'static> {
        UpsertFields {
            source_lang: "en",
            target_lang: "zh-tw",
            original_text: "Hello",
            translated_text: "你好",
            provider: "deepl",
            is_refined: false,
            refinement_model: None,
        }
    }

    #[test]
    fn get_returns_none_for_missing_key() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn upsert_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        repo.upsert("key1", sample_fields()).unwrap();

        let row = repo.get("key1").unwrap().unwrap();
        assert_eq!(row.translated_text, "你好");
        assert_eq!(row.provider, "deepl");
        assert!(!row.is_refined);
        assert_eq!(row.char_count, 5);
    }

    #[test]
    fn upsert_overwrites_and_upgrades_refinement() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        repo.upsert("key1", sample_fields()).unwrap();

        repo.upsert(
            "key1",
            UpsertFields {
                translated_text: "嗨",
                is_refined: true,
                refinement_model: Some("gpt-4o-mini"),
                ..sample_fields()
            },
        )
        .unwrap();

        let row = repo.get("key1").unwrap().unwrap();
        assert_eq!(row.translated_text, "嗨");
        assert!(row.is_refined);
        assert_eq!(row.refinement_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn touch_is_silent_on_missing_row() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        repo.touch("missing").unwrap();
    }

    #[test]
    fn delete_expired_zero_deletes_all() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        repo.upsert("key1", sample_fields()).unwrap();
        repo.upsert("key2", UpsertFields { original_text: "World", ..sample_fields() }).unwrap();

        let deleted = repo.delete_expired(0).unwrap();
        assert_eq!(deleted, 2);
        assert!(repo.get("key1").unwrap().is_none());
    }

    #[test]
    fn delete_expired_large_window_deletes_none() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        repo.upsert("key1", sample_fields()).unwrap();

        let deleted = repo.delete_expired(3650).unwrap();
        assert_eq!(deleted, 0);
        assert!(repo.get("key1").unwrap().is_some());
    }

    #[test]
    fn paginated_total_independent_of_page_size() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        for i in 0..5 {
            repo.upsert(
                &format!("key{i}"),
                UpsertFields { original_text: "Hello", ..sample_fields() },
            )
            .unwrap();
        }

        let filter = CacheFilter { page: 1, page_size: 2, ..Default::default() };
        let (page1, total1) = repo.paginated(&filter).unwrap();
        let filter2 = CacheFilter { page: 1, page_size: 100, ..Default::default() };
        let (all, total2) = repo.paginated(&filter2).unwrap();

        assert_eq!(total1, 5);
        assert_eq!(total2, 5);
        assert_eq!(page1.len(), 2);
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn paginated_filters_by_provider_and_refined_flag() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        repo.upsert("key1", sample_fields()).unwrap();
        repo.upsert(
            "key2",
            UpsertFields { provider: "google", original_text: "World", ..sample_fields() },
        )
        .unwrap();

        let filter = CacheFilter {
            providers: Some(vec!["google".to_string()]),
            page: 1,
            page_size: 10,
            ..Default::default()
        };
        let (items, total) = repo.paginated(&filter).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].provider, "google");
    }

    #[test]
    fn languages_are_distinct_and_sorted() {
        let store = Store::open_in_memory().unwrap();
        let repo = CacheRepo::new(&store);
        repo.upsert("key1", sample_fields()).unwrap();
        repo.upsert(
            "key2",
            UpsertFields { source_lang: "de", target_lang: "ja", original_text: "World", ..sample_fields() },
        )
        .unwrap();

        let langs = repo.languages().unwrap();
        assert_eq!(langs.source_languages, vec!["de", "en"]);
        assert_eq!(langs.target_languages, vec!["ja", "zh-tw"]);
    }
}
