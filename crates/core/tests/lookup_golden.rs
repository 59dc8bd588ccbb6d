use insta::assert_snapshot;
use mdfields_core::fields::{LookupOptions, LookupOutput};
use mdfields_core::resolve::{LinkResolver, LookupSources, compute_lookup};
use mdfields_core::scripting::LuaSandbox;
use mdfields_core::store::{DocumentStore, MemoryNote, MemoryStore, NotePath};

fn library() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert("Authors/Herbert.md", MemoryNote::new());
    store.insert(
        "Books/Dune.md",
        MemoryNote::new().with_field("author", "[[Authors/Herbert]]").with_field("pages", 412),
    );
    store.insert(
        "Books/Messiah.md",
        MemoryNote::new().with_field("author", "[[Herbert|Frank Herbert]]").with_field("pages", 256),
    );
    store.insert("Books/Hyperion.md", MemoryNote::new().with_field("author", "[[Simmons]]"));
    store
}

async fn render(options: LookupOptions) -> String {
    let store = library();
    let notes = store.list_notes().await.unwrap();
    let links = LinkResolver::from_notes(&notes);
    let sandbox = LuaSandbox::default();
    let sources = LookupSources { store: &store, queries: &store, sandbox: &sandbox, links: &links };
    let value = compute_lookup(sources, &NotePath::new("Authors/Herbert.md"), &options).await.unwrap();
    value.as_str().unwrap().to_string()
}

fn options(output: LookupOutput) -> LookupOptions {
    LookupOptions {
        source: "\"Books\"".into(),
        target_field_name: "author".into(),
        output,
        ..Default::default()
    }
}

#[tokio::test]
async fn golden_links_bullet_list() {
    let rendered = render(options(LookupOutput::LinksBulletList)).await;
    assert_snapshot!(rendered, @r"
    - [[Books/Dune]]
    - [[Books/Messiah]]
    ");
}

#[tokio::test]
async fn golden_custom_bullet_list() {
    let rendered = render(LookupOptions {
        custom_list_function: Some("page.file.name .. ' (' .. page.pages .. ' pages)'".into()),
        ..options(LookupOutput::CustomBulletList)
    })
    .await;
    assert_snapshot!(rendered, @r"
    - Dune (412 pages)
    - Messiah (256 pages)
    ");
}
