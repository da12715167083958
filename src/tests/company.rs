use crate::app::errors::AppError;
use crate::company::{CompanyBookmarkInput, CompanyStore};

fn input(id: Option<u64>, title: &str) -> CompanyBookmarkInput {
    CompanyBookmarkInput {
        id,
        title: title.to_string(),
        url: format!("https://intranet.example.com/{}", title.to_lowercase()),
        ..Default::default()
    }
}

#[test]
fn replace_all_creates_updates_and_deletes() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CompanyStore::load(tmp.path()).unwrap();

    let created = store
        .replace_all(vec![input(None, "Wiki"), input(None, "Payroll")])
        .unwrap();
    assert_eq!(created.len(), 2);
    let wiki = created.iter().find(|b| b.title == "Wiki").unwrap().id;
    let payroll = created.iter().find(|b| b.title == "Payroll").unwrap().id;

    let replaced = store
        .replace_all(vec![input(Some(wiki), "Handbook"), input(None, "Jira")])
        .unwrap();

    let titles: Vec<_> = replaced.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Handbook", "Jira"]);
    assert_eq!(replaced[0].id, wiki);
    assert!(replaced.iter().all(|b| b.id != payroll));
}

#[test]
fn replace_all_validates_every_row() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CompanyStore::load(tmp.path()).unwrap();
    store.replace_all(vec![input(None, "Wiki")]).unwrap();

    let mut bad = input(None, "Broken");
    bad.url = "not a url".to_string();

    let err = store
        .replace_all(vec![input(None, "Fine"), bad])
        .unwrap_err();
    assert!(
        matches!(err, AppError::Validation(ref msg) if msg == "The bookmarks.1.url field must be a valid URL.")
    );

    // nothing changed
    let titles: Vec<_> = store.list().into_iter().map(|b| b.title).collect();
    assert_eq!(titles, vec!["Wiki"]);
}

#[test]
fn favorites_are_per_user_and_persisted() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CompanyStore::load(tmp.path()).unwrap();
    let id = store.replace_all(vec![input(None, "Wiki")]).unwrap()[0].id;

    assert!(store.toggle_favorite(1, id).unwrap());
    assert!(store.list_for(1)[0].is_favorite);
    assert!(!store.list_for(2)[0].is_favorite);

    let reloaded = CompanyStore::load(tmp.path()).unwrap();
    assert!(reloaded.list_for(1)[0].is_favorite);

    assert!(!reloaded.toggle_favorite(1, id).unwrap());
    assert!(!reloaded.list_for(1)[0].is_favorite);

    assert!(matches!(
        reloaded.toggle_favorite(1, 999),
        Err(AppError::NotFound)
    ));
}

#[test]
fn removing_a_company_bookmark_drops_its_favorites() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CompanyStore::load(tmp.path()).unwrap();
    let rows = store
        .replace_all(vec![input(None, "Wiki"), input(None, "Jira")])
        .unwrap();
    let jira = rows.iter().find(|b| b.title == "Jira").unwrap().id;
    store.toggle_favorite(1, jira).unwrap();

    store
        .replace_all(vec![input(Some(rows[0].id), "Wiki")])
        .unwrap();

    let reloaded = CompanyStore::load(tmp.path()).unwrap();
    let views = reloaded.list_for(1);
    assert_eq!(views.len(), 1);
    assert!(!views[0].is_favorite);
}

#[test]
fn failed_save_leaves_memory_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CompanyStore::load(tmp.path()).unwrap();
    let id = store.replace_all(vec![input(None, "Wiki")]).unwrap()[0].id;

    let blocker = tmp.path().join("company_bookmarks.csv-tmp");
    std::fs::create_dir(&blocker).unwrap();

    assert!(store.replace_all(vec![input(None, "Jira")]).is_err());
    assert!(store.toggle_favorite(7, id).is_err());

    let titles: Vec<_> = store.list().into_iter().map(|b| b.title).collect();
    assert_eq!(titles, vec!["Wiki"]);
    assert!(!store.list_for(7)[0].is_favorite);

    std::fs::remove_dir(&blocker).unwrap();
    assert!(store.toggle_favorite(7, id).unwrap());
}
