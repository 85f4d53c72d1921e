//! Internationalization (i18n) support
//!
//! UI strings ship built in for `pt-BR` and `en`; a `languages/<lang>.yml`
//! file in the site directory overrides or extends them.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const PT_BR: &[(&str, &str)] = &[
    ("home", "Home"),
    ("load_more", "Carregar mais posts"),
    ("loading", "Carregando..."),
    ("previous_post", "Post anterior"),
    ("next_post", "Próximo post"),
    ("reading_time", "min"),
    ("edited_at", "* editado em"),
    ("not_found", "Página não encontrada"),
    ("not_found_text", "O post que você procura não existe."),
    ("back_home", "Voltar para a home"),
    ("no_posts", "Nenhum post publicado ainda."),
];

const EN: &[(&str, &str)] = &[
    ("home", "Home"),
    ("load_more", "Load more posts"),
    ("loading", "Loading..."),
    ("previous_post", "Previous post"),
    ("next_post", "Next post"),
    ("reading_time", "min"),
    ("edited_at", "* edited on"),
    ("not_found", "Page not found"),
    ("not_found_text", "The post you are looking for does not exist."),
    ("back_home", "Back to home"),
    ("no_posts", "No posts published yet."),
];

/// Internationalization handler
#[derive(Debug, Clone)]
pub struct I18n {
    /// Current language
    language: String,
    /// Language data: lang -> key -> translation
    translations: HashMap<String, HashMap<String, String>>,
}

impl I18n {
    /// Create a handler with the built-in tables
    pub fn new(language: &str) -> Self {
        let mut translations = HashMap::new();
        for (lang, table) in [("pt-BR", PT_BR), ("en", EN)] {
            translations.insert(
                lang.to_string(),
                table
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        Self {
            language: language.to_string(),
            translations,
        }
    }

    /// Load language files (`<lang>.yml`) from a directory
    pub fn load_languages<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if !path.is_file() || !matches!(ext, Some("yml") | Some("yaml")) {
                continue;
            }

            let lang = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("en")
                .to_string();

            let content = fs::read_to_string(&path)?;
            match serde_yaml::from_str::<HashMap<String, serde_yaml::Value>>(&content) {
                Ok(data) => {
                    let mut flat = HashMap::new();
                    flatten_translations(&data, "", &mut flat);
                    self.translations.entry(lang).or_default().extend(flat);
                    tracing::debug!("Loaded language file: {:?}", path);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse language file {:?}: {}", path, e);
                }
            }
        }

        Ok(())
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get a translation by key; falls back to the base language, then English,
    /// then the key itself
    pub fn get(&self, key: &str) -> String {
        self.fallback_chain()
            .iter()
            .find_map(|lang| self.translations.get(lang.as_str())?.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// All translations for the current language, fallbacks merged in
    pub fn get_all_translations(&self) -> HashMap<String, String> {
        let mut result = HashMap::new();
        for lang in self.fallback_chain() {
            if let Some(table) = self.translations.get(lang.as_str()) {
                for (k, v) in table {
                    result.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
        result
    }

    fn fallback_chain(&self) -> Vec<String> {
        let mut chain = vec![self.language.clone()];
        if let Some((base, _)) = self.language.split_once('-') {
            chain.push(base.to_string());
        }
        if !chain.iter().any(|l| l == "en") {
            chain.push("en".to_string());
        }
        chain
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new("pt-BR")
    }
}

/// Flatten nested YAML into dot-notation keys
fn flatten_translations(
    data: &HashMap<String, serde_yaml::Value>,
    prefix: &str,
    result: &mut HashMap<String, String>,
) {
    for (key, value) in data {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            serde_yaml::Value::Mapping(map) => {
                let nested: HashMap<String, serde_yaml::Value> = map
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.clone())))
                    .collect();
                flatten_translations(&nested, &full_key, result);
            }
            serde_yaml::Value::String(s) => {
                result.insert(full_key, s.clone());
            }
            serde_yaml::Value::Number(n) => {
                result.insert(full_key, n.to_string());
            }
            serde_yaml::Value::Bool(b) => {
                result.insert(full_key, b.to_string());
            }
            _ => {}
        }
    }
}
