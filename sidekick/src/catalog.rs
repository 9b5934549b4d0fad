//! Section catalog: the static map of application sections.
//!
//! Loaded once at startup and shared read-only between the alias resolver and
//! the navigation handler. The built-in defaults cover the stock application
//! layout; deployments can replace them from configuration.

use crate::types::Section;

/// Read-only collection of [`Section`] entries.
#[derive(Debug, Clone)]
pub struct SectionCatalog {
    sections: Vec<Section>,
}

impl SectionCatalog {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Catalog with the stock sections and their Russian/English aliases.
    pub fn with_defaults() -> Self {
        Self::new(default_sections())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn by_id(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn section(id: &str, title: &str, path: &str, aliases: &[&str], sidebar: bool) -> Section {
    Section {
        id: id.to_string(),
        title: title.to_string(),
        path: path.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        sidebar,
    }
}

fn default_sections() -> Vec<Section> {
    vec![
        section(
            "dashboard",
            "Дашборд",
            "/",
            &["дашборд", "главная", "домой", "home", "dashboard", "overview"],
            true,
        ),
        section(
            "tasks",
            "Задачи",
            "/tasks",
            &["задачи", "мои задачи", "таски", "дела", "tasks", "todo"],
            true,
        ),
        section(
            "news",
            "Новости",
            "/news",
            &["новости", "лента", "лента новостей", "news", "feed"],
            true,
        ),
        section(
            "calendar",
            "Календарь",
            "/calendar",
            &["календарь", "расписание", "calendar", "schedule"],
            true,
        ),
        section(
            "settings",
            "Настройки",
            "/settings",
            &["настройки", "параметры", "settings", "preferences"],
            false,
        ),
        section(
            "profile",
            "Профиль",
            "/profile",
            &["профиль", "аккаунт", "profile", "account"],
            false,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_unique_ids_and_paths() {
        let catalog = SectionCatalog::with_defaults();
        let sections = catalog.sections();
        assert!(!sections.is_empty());
        for (i, a) in sections.iter().enumerate() {
            for b in &sections[i + 1..] {
                assert_ne!(a.id, b.id);
                assert_ne!(a.path, b.path);
            }
        }
    }

    #[test]
    fn lookup_by_id() {
        let catalog = SectionCatalog::with_defaults();
        assert_eq!(catalog.by_id("tasks").map(|s| s.path.as_str()), Some("/tasks"));
        assert!(catalog.by_id("missing").is_none());
    }
}
