use wasm_bindgen::prelude::*;

/// 送信前のクライアント側チェック。サーバと同じ判定ロジックを公開する。
/// ここでの結果は入力欄の警告表示に使うだけで、減点の判定は常に
/// サーバ側の評価が正になる。
#[wasm_bindgen]
pub fn contains_korean(text: &str) -> bool {
    matcha_common::filter::contains_korean(text)
}

/// 1文字版。入力中のインクリメンタルなハイライト用。
#[wasm_bindgen]
pub fn is_korean_char(c: char) -> bool {
    matcha_common::filter::is_korean_char(c)
}
