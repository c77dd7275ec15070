//! Catalog: 内置的测速区域和镜像服务器列表
//!
//! 每个区域的服务器按优先级排列，测速前由探测逻辑依次尝试。

use serde::{Deserialize, Serialize};

/// 一个候选下载地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    pub url: String,
}

impl Server {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// 测速区域
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub code: &'static str,
    pub title: &'static str,
    servers: &'static [(&'static str, &'static str)],
}

impl Region {
    pub fn servers(&self) -> Vec<Server> {
        self.servers
            .iter()
            .map(|(name, url)| Server::new(*name, *url))
            .collect()
    }
}

/// 菜单和 all 模式使用的区域顺序
pub const ORDER: [&str; 17] = [
    "ru", "us", "ca", "mx", "br", "uk", "fr", "de", "nl", "es", "pl", "se", "sg", "jp", "kr", "au", "za",
];

const REGIONS: &[Region] = &[
    Region {
        code: "ru",
        title: "俄罗斯",
        servers: &[
            ("Selectel", "https://speedtest.selectel.ru/10GB"),
            ("RastrNet", "http://speedtest.rastrnet.ru/10GB.zip"),
            ("RastrNet (fallback)", "http://speedtest.rastrnet.ru/1GB.zip"),
            ("TrueNetwork", "https://mirror-1.truenetwork.ru/speedtest/10GiB"),
            ("TrueNetwork (fallback)", "https://mirror-1.truenetwork.ru/speedtest/1GiB"),
        ],
    },
    // 北美
    Region {
        code: "us",
        title: "美国",
        servers: &[
            ("Vultr New Jersey (East)", "https://nj-us-ping.vultr.com/vultr.com.100MB.bin"),
            ("Vultr Los Angeles (West)", "https://lax-ca-us-ping.vultr.com/vultr.com.100MB.bin"),
            ("Leaseweb US mirror", "http://mirror.us.leaseweb.net/speedtest/10000mb.bin"),
            ("Leaseweb US mirror (fallback)", "http://mirror.us.leaseweb.net/speedtest/1000mb.bin"),
        ],
    },
    Region {
        code: "ca",
        title: "加拿大",
        servers: &[
            ("Vultr Toronto", "https://tor-ca-ping.vultr.com/vultr.com.100MB.bin"),
            ("Vultr Vancouver", "https://yvr-ca-ping.vultr.com/vultr.com.100MB.bin"),
        ],
    },
    Region {
        code: "mx",
        title: "墨西哥",
        servers: &[("Vultr Mexico City", "https://mex-mx-ping.vultr.com/vultr.com.100MB.bin")],
    },
    Region {
        code: "br",
        title: "巴西",
        servers: &[("Vultr Sao Paulo", "https://sao-br-ping.vultr.com/vultr.com.100MB.bin")],
    },
    // 欧洲
    Region {
        code: "uk",
        title: "英国",
        servers: &[
            ("Vultr London", "https://lon-gb-ping.vultr.com/vultr.com.100MB.bin"),
            ("ThinkBroadband (UK)", "http://ipv4.download.thinkbroadband.com/10GB.zip"),
            ("ThinkBroadband (UK) (fallback)", "http://ipv4.download.thinkbroadband.com/1GB.zip"),
        ],
    },
    Region {
        code: "fr",
        title: "法国",
        servers: &[
            ("Vultr Paris", "https://par-fr-ping.vultr.com/vultr.com.100MB.bin"),
            ("OVH (FR)", "http://proof.ovh.net/files/10Gb.dat"),
            ("OVH (FR) (fallback)", "http://proof.ovh.net/files/1Gb.dat"),
        ],
    },
    Region {
        code: "de",
        title: "德国",
        servers: &[
            ("Vultr Frankfurt", "https://fra-de-ping.vultr.com/vultr.com.100MB.bin"),
            ("Hetzner (DE)", "https://speed.hetzner.de/10GB.bin"),
            ("Hetzner (DE) (fallback)", "https://speed.hetzner.de/1GB.bin"),
        ],
    },
    Region {
        code: "nl",
        title: "荷兰",
        servers: &[
            ("Vultr Amsterdam", "https://ams-nl-ping.vultr.com/vultr.com.100MB.bin"),
            ("Leaseweb NL mirror", "http://mirror.nl.leaseweb.net/speedtest/10000mb.bin"),
            ("Leaseweb NL mirror (fallback)", "http://mirror.nl.leaseweb.net/speedtest/1000mb.bin"),
        ],
    },
    Region {
        code: "es",
        title: "西班牙",
        servers: &[("Vultr Madrid", "https://mad-es-ping.vultr.com/vultr.com.100MB.bin")],
    },
    Region {
        code: "pl",
        title: "波兰",
        servers: &[("Vultr Warsaw", "https://waw-pl-ping.vultr.com/vultr.com.100MB.bin")],
    },
    Region {
        code: "se",
        title: "瑞典",
        servers: &[
            ("Vultr Stockholm", "https://sto-se-ping.vultr.com/vultr.com.100MB.bin"),
            ("Tele2 (SE)", "http://speedtest.tele2.net/10GB.zip"),
            ("Tele2 (SE) (fallback)", "http://speedtest.tele2.net/1GB.zip"),
        ],
    },
    // 亚洲 / 大洋洲
    Region {
        code: "sg",
        title: "新加坡",
        servers: &[("Vultr Singapore", "https://sgp-ping.vultr.com/vultr.com.100MB.bin")],
    },
    Region {
        code: "jp",
        title: "日本",
        servers: &[("Vultr Tokyo (HND)", "https://hnd-jp-ping.vultr.com/vultr.com.100MB.bin")],
    },
    Region {
        code: "kr",
        title: "韩国",
        servers: &[("Vultr Seoul", "https://sel-kor-ping.vultr.com/vultr.com.100MB.bin")],
    },
    Region {
        code: "au",
        title: "澳大利亚",
        servers: &[("Vultr Sydney", "https://syd-au-ping.vultr.com/vultr.com.100MB.bin")],
    },
    // 非洲
    Region {
        code: "za",
        title: "南非",
        servers: &[("Vultr Johannesburg", "https://jnb-za-ping.vultr.com/vultr.com.100MB.bin")],
    },
];

/// 按代码查找区域（不区分大小写）
pub fn region(code: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.code.eq_ignore_ascii_case(code))
}

/// 按 ORDER 顺序返回所有区域
pub fn regions_in_order() -> impl Iterator<Item = &'static Region> {
    ORDER.iter().filter_map(|code| region(code))
}
