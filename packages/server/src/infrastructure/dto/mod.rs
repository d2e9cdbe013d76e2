//! Data Transfer Objects
//!
//! 開発用の参照 API（`GET /api/rooms` など）のレスポンス DTO。
//! `createRoom` / `createToken` とシグナリングのワイヤ型は
//! `kizuna_shared::api` に定義されています。

pub mod http;
