//! 韓国語（ハングル）検出フィルタ。
//!
//! サーバ（ポイント減点の判定）とブラウザクライアント（送信前の警告）の
//! 両方から同一のロジックを使うため、共通クレートに置く。
//! 判定結果に副作用を持つのはサーバ側のみ。

/// ハングル字母 (U+1100–U+11FF)
const HANGUL_JAMO: (char, char) = ('\u{1100}', '\u{11FF}');
/// ハングル互換字母 (U+3130–U+318F)
const HANGUL_COMPAT_JAMO: (char, char) = ('\u{3130}', '\u{318F}');
/// ハングル音節文字 (U+AC00–U+D7AF)
const HANGUL_SYLLABLES: (char, char) = ('\u{AC00}', '\u{D7AF}');

const RANGES: [(char, char); 3] = [HANGUL_JAMO, HANGUL_COMPAT_JAMO, HANGUL_SYLLABLES];

/// テキストにハングルが1文字でも含まれるか判定する。
///
/// 純粋・決定的・状態なし。入力全体を走査するが、最初の該当文字で
/// 打ち切る。
pub fn contains_korean(text: &str) -> bool {
    text.chars().any(is_korean_char)
}

/// 単一文字がハングルのコードポイント範囲に入るか判定する。
pub fn is_korean_char(c: char) -> bool {
    RANGES.iter().any(|&(lo, hi)| lo <= c && c <= hi)
}
