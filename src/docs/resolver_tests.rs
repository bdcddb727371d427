use super::*;

use std::path::PathBuf;

use tempfile::TempDir;

use crate::docs::reflection_index::ReflectionIndex;

const REFLECTION: &str = r#"<reflection><apis>
  <api id="T:Ns.IWidget"><apidata group="type"/></api>
  <api id="M:Ns.IWidget.Resize"><apidata group="member"/>
    <containers><type api="T:Ns.IWidget"/></containers></api>
  <api id="T:Ns.Base"><apidata group="type"/>
    <implements><type api="T:Ns.IWidget"/></implements></api>
  <api id="M:Ns.Base.Draw(System.Int32)"><apidata group="member"/>
    <containers><type api="T:Ns.Base"/></containers></api>
  <api id="M:Ns.Base.Partial(System.Int32)"><apidata group="member"/>
    <containers><type api="T:Ns.Base"/></containers></api>
  <api id="T:Ns.Derived"><apidata group="type"/>
    <bases><type api="T:Ns.Base"/></bases></api>
  <api id="M:Ns.Derived.Draw(System.Int32)"><apidata group="member"/>
    <containers><type api="T:Ns.Derived"/></containers></api>
  <api id="M:Ns.Derived.Partial(System.Int32)"><apidata group="member"/>
    <containers><type api="T:Ns.Derived"/></containers></api>
  <api id="M:Ns.Derived.Ns#IWidget#Resize"><apidata group="member"/>
    <containers><type api="T:Ns.Derived"/></containers>
    <implements><member api="M:Ns.IWidget.Resize"/></implements></api>
</apis></reflection>"#;

const COMMENTS: &str = r#"<doc><members>
<member name="T:Ns.Base"><summary>Base type.</summary></member>
<member name="M:Ns.Base.Draw(System.Int32)"><summary>Draws the widget.</summary><param name="depth">Depth.</param><returns>Base returns.</returns></member>
<member name="M:Ns.Base.Partial(System.Int32)"><summary>Partial summary.</summary><returns>Base returns.</returns></member>
<member name="M:Ns.Base.Alias"><inheritdoc cref="Draw(System.Int32)"/></member>
<member name="T:Ns.Derived"><inheritdoc/></member>
<member name="M:Ns.Derived.Draw(System.Int32)"><inheritdoc/></member>
<member name="M:Ns.Derived.Partial(System.Int32)"><returns>Local returns.</returns><inheritdoc/></member>
<member name="M:Ns.Derived.Ns#IWidget#Resize"><inheritdoc/></member>
<member name="M:Ns.IWidget.Resize"><summary>Resizes.</summary></member>
<member name="M:Ns.Other.Loop1"><inheritdoc cref="M:Ns.Other.Loop2"/></member>
<member name="M:Ns.Other.Loop2"><inheritdoc cref="M:Ns.Other.Loop1"/></member>
<member name="M:Ns.Orphan.Run"><inheritdoc/></member>
<member name="M:Ns.Base.Sample"><example><![CDATA[Use <inheritdoc/> to inherit docs.]]></example></member>
</members></doc>"#;

async fn fixture(dir: &TempDir) -> (ReflectionIndex, CommentsCache) {
    let path = dir.path().join("comments.xml");
    tokio::fs::write(&path, COMMENTS).await.expect("write comments");
    let index = ReflectionIndex::from_content(REFLECTION).expect("reflection should parse");
    let cache = CommentsCache::open(&[path], None).await.expect("open cache");
    (index, cache)
}

#[tokio::test]
async fn test_resolves_through_base_class() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (index, mut cache) = fixture(&dir).await;
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let resolved = engine
        .resolve("M:Ns.Derived.Draw(System.Int32)")
        .await
        .expect("resolution should succeed");
    assert_eq!(
        resolved,
        "<summary>Draws the widget.</summary><param name=\"depth\">Depth.</param><returns>Base returns.</returns>"
    );
}

#[tokio::test]
async fn test_local_elements_survive_the_merge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (index, mut cache) = fixture(&dir).await;
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let resolved = engine
        .resolve("M:Ns.Derived.Partial(System.Int32)")
        .await
        .expect("resolution should succeed");
    assert_eq!(
        resolved,
        "<returns>Local returns.</returns><summary>Partial summary.</summary>"
    );
}

#[tokio::test]
async fn test_explicit_interface_implementation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (index, mut cache) = fixture(&dir).await;
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let resolved = engine
        .resolve("M:Ns.Derived.Ns#IWidget#Resize")
        .await
        .expect("resolution should succeed");
    assert_eq!(resolved, "<summary>Resizes.</summary>");
}

#[tokio::test]
async fn test_type_level_inheritance() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (index, mut cache) = fixture(&dir).await;
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let resolved = engine.resolve("T:Ns.Derived").await.expect("resolution should succeed");
    assert_eq!(resolved, "<summary>Base type.</summary>");
}

#[tokio::test]
async fn test_unprefixed_cref_finds_sibling_member() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (index, mut cache) = fixture(&dir).await;
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let resolved = engine.resolve("M:Ns.Base.Alias").await.expect("resolution should succeed");
    assert!(resolved.contains("<summary>Draws the widget.</summary>"));
}

#[tokio::test]
async fn test_cyclic_cref_fails_for_every_member_in_the_cycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (index, mut cache) = fixture(&dir).await;
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let err = engine.resolve("M:Ns.Other.Loop1").await.expect_err("cycle must fail");
    match err {
        ResolutionError::CyclicInheritance { chain } => {
            assert_eq!(
                chain,
                vec![
                    "M:Ns.Other.Loop1".to_string(),
                    "M:Ns.Other.Loop2".to_string(),
                    "M:Ns.Other.Loop1".to_string(),
                ]
            );
        }
        other => panic!("expected CyclicInheritance, got {other:?}"),
    }

    // Failures are not memoized, so the other participant reports its own
    // cycle instead of silently inheriting a broken result
    let err = engine.resolve("M:Ns.Other.Loop2").await.expect_err("cycle must fail");
    assert!(matches!(err, ResolutionError::CyclicInheritance { .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_literal_tag_mention_keeps_authored_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (index, mut cache) = fixture(&dir).await;
    let mut engine = ResolveEngine::new(&index, &mut cache);

    // The tag only appears as CDATA text; the fragment must come back
    // untouched instead of pulling in ancestor documentation
    let resolved = engine.resolve("M:Ns.Base.Sample").await.expect("resolution should succeed");
    assert_eq!(
        resolved,
        "<example><![CDATA[Use <inheritdoc/> to inherit docs.]]></example>"
    );
}

#[tokio::test]
async fn test_exhausted_chain_reports_no_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (index, mut cache) = fixture(&dir).await;
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let err = engine.resolve("M:Ns.Orphan.Run").await.expect_err("orphan must fail");
    match err {
        ResolutionError::NoSourceFound { member } => assert_eq!(member, "M:Ns.Orphan.Run"),
        other => panic!("expected NoSourceFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_memoization_shares_a_common_ancestor() {
    let reflection = r#"<reflection><apis>
      <api id="T:A.Root"><apidata group="type"/></api>
      <api id="M:A.Root.Go"><apidata group="member"/>
        <containers><type api="T:A.Root"/></containers></api>
      <api id="T:A.L1"><apidata group="type"/><bases><type api="T:A.Root"/></bases></api>
      <api id="M:A.L1.Go"><apidata group="member"/>
        <containers><type api="T:A.L1"/></containers></api>
      <api id="T:A.L2"><apidata group="type"/><bases><type api="T:A.Root"/></bases></api>
      <api id="M:A.L2.Go"><apidata group="member"/>
        <containers><type api="T:A.L2"/></containers></api>
    </apis></reflection>"#;
    let comments = r#"<doc><members>
<member name="M:A.Root.Go"><summary>Go.</summary></member>
<member name="M:A.L1.Go"><inheritdoc/></member>
<member name="M:A.L2.Go"><inheritdoc/></member>
</members></doc>"#;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("comments.xml");
    tokio::fs::write(&path, comments).await.expect("write comments");
    let index = ReflectionIndex::from_content(reflection).expect("reflection should parse");
    let mut cache = CommentsCache::open(&[path], None).await.expect("open cache");
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let first = engine.resolve("M:A.L1.Go").await.expect("resolution should succeed");
    let second = engine.resolve("M:A.L2.Go").await.expect("resolution should succeed");
    assert_eq!(first, "<summary>Go.</summary>");
    assert_eq!(second, first);
    assert_eq!(engine.resolved_count(), 3);

    // L1 walk looked up L1 and Root; L2 hit the memoized Root result
    drop(engine);
    assert_eq!(cache.stats().lookups, 3);
}

#[tokio::test]
async fn test_skips_undocumented_intermediate() {
    let reflection = r#"<reflection><apis>
      <api id="T:A.Root"><apidata group="type"/></api>
      <api id="M:A.Root.Go"><apidata group="member"/>
        <containers><type api="T:A.Root"/></containers></api>
      <api id="T:A.Mid"><apidata group="type"/><bases><type api="T:A.Root"/></bases></api>
      <api id="M:A.Mid.Go"><apidata group="member"/>
        <containers><type api="T:A.Mid"/></containers></api>
      <api id="T:A.Leaf"><apidata group="type"/><bases><type api="T:A.Mid"/></bases></api>
      <api id="M:A.Leaf.Go"><apidata group="member"/>
        <containers><type api="T:A.Leaf"/></containers></api>
    </apis></reflection>"#;
    // A.Mid.Go exists in reflection data but has no comments at all
    let comments = r#"<doc><members>
<member name="M:A.Root.Go"><summary>Root says go.</summary></member>
<member name="M:A.Leaf.Go"><inheritdoc/></member>
</members></doc>"#;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("comments.xml");
    tokio::fs::write(&path, comments).await.expect("write comments");
    let index = ReflectionIndex::from_content(reflection).expect("reflection should parse");
    let mut cache = CommentsCache::open(&[path], None).await.expect("open cache");
    let mut engine = ResolveEngine::new(&index, &mut cache);

    let resolved = engine.resolve("M:A.Leaf.Go").await.expect("resolution should succeed");
    assert_eq!(resolved, "<summary>Root says go.</summary>");
}
