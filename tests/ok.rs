use std::fs;

#[test]
fn test() {
    fs::read_dir("./tests/ok/").unwrap().for_each(|entry| {
        let path = entry.unwrap().path();
        let name = path.file_stem().unwrap().to_str().unwrap().to_owned();

        let src = fs::read_to_string(&path).unwrap();
        let mut dest = vec![];
        let diagnostics = pasc::compile(&src, &mut dest).unwrap();
        assert!(diagnostics.is_empty(), "{name}: {diagnostics:?}");
        let code = String::from_utf8(dest).unwrap();
        insta::assert_snapshot!(name, code);
    })
}
