use serde::Serialize;

/// A listed instrument the service knows a display name for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instrument {
    pub symbol: &'static str,
    pub name: &'static str,
}

// Indonesia Stock Exchange blue chips; market data symbols carry a ".JK" suffix
static IDX_STOCKS: [Instrument; 23] = [
    Instrument { symbol: "BBCA", name: "Bank Central Asia" },
    Instrument { symbol: "BBRI", name: "Bank Rakyat Indonesia" },
    Instrument { symbol: "BMRI", name: "Bank Mandiri" },
    Instrument { symbol: "TLKM", name: "Telkom Indonesia" },
    Instrument { symbol: "ASII", name: "Astra International" },
    Instrument { symbol: "UNVR", name: "Unilever Indonesia" },
    Instrument { symbol: "ICBP", name: "Indofood CBP Sukses Makmur" },
    Instrument { symbol: "HMSP", name: "HM Sampoerna" },
    Instrument { symbol: "GGRM", name: "Gudang Garam" },
    Instrument { symbol: "KLBF", name: "Kalbe Farma" },
    Instrument { symbol: "INDF", name: "Indofood Sukses Makmur" },
    Instrument { symbol: "PGAS", name: "Perusahaan Gas Negara" },
    Instrument { symbol: "PTBA", name: "Bukit Asam" },
    Instrument { symbol: "ADRO", name: "Adaro Energy" },
    Instrument { symbol: "ANTM", name: "Aneka Tambang" },
    Instrument { symbol: "BBNI", name: "Bank Negara Indonesia" },
    Instrument { symbol: "ERAA", name: "Erajaya Swasembada" },
    Instrument { symbol: "JSMR", name: "Jasa Marga" },
    Instrument { symbol: "MNCN", name: "Media Nusantara Citra" },
    Instrument { symbol: "SMGR", name: "Semen Indonesia" },
    Instrument { symbol: "TINS", name: "Timah" },
    Instrument { symbol: "UNTR", name: "United Tractors" },
    Instrument { symbol: "WIKA", name: "Wijaya Karya" },
];

pub fn all() -> &'static [Instrument] {
    &IDX_STOCKS
}

/// Finds an instrument by symbol, ignoring case and a trailing ".JK".
pub fn lookup(symbol: &str) -> Option<&'static Instrument> {
    let upper = symbol.trim().to_uppercase();
    let bare = upper.strip_suffix(".JK").unwrap_or(upper.as_str());
    IDX_STOCKS.iter().find(|i| i.symbol == bare)
}

/// Market data symbol for an exchange listing, e.g. "BBCA" -> "BBCA.JK".
pub fn market_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if upper.ends_with(".JK") {
        upper
    } else {
        format!("{}.JK", upper)
    }
}
