//! 短码生成
//!
//! 短码是 `(url, owner_id)` 的确定性函数：同一用户重复提交同一链接得到同一短码。
//! 32 位哈希会有碰撞，碰撞时共享短码，由存储唯一键保留第一个写入者。

use xxhash_rust::xxh32::xxh32;

const HASH_SEED: u32 = 0;

/// 计算短码：xxHash32(trim(url) + owner_id)，输出 10 位补零十进制
pub fn compute_code(url: &str, owner_id: i64) -> String {
    let mut input = String::with_capacity(url.len() + 20);
    input.push_str(url.trim());
    input.push_str(&owner_id.to_string());

    format!("{:010}", xxh32(input.as_bytes(), HASH_SEED))
}

/// 短码格式检查，和 `GET /{code:[0-9]+}` 路由保持一致
pub fn is_valid_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}
