use chrono::NaiveDate;

/// How a batch upsert resolves rows that already exist in storage.
///
/// Historical backfill never rewrites a bar (`DoNothing`); the trailing
/// incremental path for US ETFs refreshes mutable fields because the most
/// recent bar can be revised upstream until market close (`UpdateLatest`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    DoNothing,
    UpdateLatest,
}

/// A fixed named set of symbols sharing one fetch/storage policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Universe {
    EtfIndia,
    StockIndia,
    EtfUs,
    Index,
}

impl Universe {
    pub const ALL: [Universe; 4] = [
        Universe::EtfIndia,
        Universe::StockIndia,
        Universe::EtfUs,
        Universe::Index,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Universe::EtfIndia => "etf-india",
            Universe::StockIndia => "stock-india",
            Universe::EtfUs => "etf-us",
            Universe::Index => "index",
        }
    }

    /// Table holding this universe's daily bars.
    pub fn data_table(&self) -> &'static str {
        match self {
            Universe::EtfIndia => "etf_data",
            Universe::StockIndia => "stock_data",
            Universe::EtfUs => "international_etf_data",
            Universe::Index => "index_data",
        }
    }

    /// Companion table holding one row of metadata per symbol.
    pub fn info_table(&self) -> &'static str {
        match self {
            Universe::EtfIndia => "etf_info",
            Universe::StockIndia => "stock_info",
            Universe::EtfUs => "international_etf_info",
            Universe::Index => "index_info",
        }
    }

    pub fn instrument_type(&self) -> &'static str {
        match self {
            Universe::EtfIndia | Universe::EtfUs => "ETF",
            Universe::StockIndia => "STOCK",
            Universe::Index => "INDEX",
        }
    }

    /// Earliest date a full backfill reaches for this universe.
    pub fn floor_date(&self) -> NaiveDate {
        let (y, m, d) = match self {
            Universe::EtfIndia => (2010, 1, 1),
            Universe::StockIndia => (2001, 1, 1),
            Universe::EtfUs => (2000, 1, 1),
            Universe::Index => (2001, 1, 1),
        };
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Conflict policy for the trailing incremental update.
    pub fn incremental_policy(&self) -> ConflictPolicy {
        match self {
            // US providers revise the latest bar intraday.
            Universe::EtfUs => ConflictPolicy::UpdateLatest,
            _ => ConflictPolicy::DoNothing,
        }
    }

    /// Symbols as stored, in the fixed processing order for a run.
    pub fn symbols(&self) -> &'static [&'static str] {
        match self {
            Universe::EtfIndia => ETF_INDIA_SYMBOLS,
            Universe::StockIndia => STOCK_INDIA_SYMBOLS,
            Universe::EtfUs => ETF_US_SYMBOLS,
            Universe::Index => INDEX_SYMBOLS,
        }
    }

    /// Translate a storage symbol into the provider's ticker format.
    ///
    /// NSE instruments carry a `.NS` suffix upstream; the NIFTY 50 index is
    /// stored as `NIFTY50` but quoted as `^NSEI`; US tickers pass through.
    pub fn provider_symbol(&self, symbol: &str) -> String {
        match self {
            Universe::EtfIndia | Universe::StockIndia => format!("{}.NS", symbol),
            Universe::EtfUs => symbol.to_string(),
            Universe::Index => match symbol {
                "NIFTY50" => "^NSEI".to_string(),
                other => other.to_string(),
            },
        }
    }
}

static INDEX_SYMBOLS: &[&str] = &["NIFTY50"];

static ETF_INDIA_SYMBOLS: &[&str] = &[
    "TATAGOLD", "GOLDBEES", "SILVERBEES", "TATSILV", "METALIETF", "ITBEES",
    "GOLDCASE", "SILVERCASE", "LIQUIDCASE", "GOLDIETF", "SILVERIETF", "SETFGOLD",
    "HDFCGOLD", "HDFCSILVER", "NIFTYBEES", "PSUBNKBEES", "PHARMABEES", "METAL",
    "ALPL30IETF", "LIQUIDBEES", "OILIETF", "SBISILVER", "SILVER", "MIDCAPETF",
    "PVTBANIETF", "LTGILTBEES", "GOLD1", "LOWVOLIETF", "SILVERETF", "ALPHA",
    "MODEFENCE", "AXISGOLD", "MID150CASE", "GOLDETF", "SMALLCAP", "SILVER1",
    "MOREALTY", "MON100", "MOM30IETF", "MIDCAPIETF", "BSLGOLDETF", "FMCGIETF",
    "GOLDSHARE", "CPSEETF", "MOSMALL250", "SETFNIF50", "SILVERADD", "MOGOLD",
    "AXISILVER", "ITIETF", "HDFCSML250", "MID150BEES", "BANKBEES", "FINIETF",
    "NV20IETF", "NIFTYIETF", "GOLDETFADD", "MAHKTECH", "NEXT50IETF", "AUTOIETF",
    "MAFANG", "BANKIETF", "PSUBNKIETF", "ALPHAETF", "MOMENTUM50", "MOM100",
    "ICICIB22", "LIQUIDIETF", "ABSLPSE", "ESILVER", "HDFCMID150", "IT", "ITETF",
    "CONSUMER", "MULTICAP", "MONIFTY500", "MOSILVER", "UTIBANKETF", "MONQ50",
    "COMMOIETF", "MASPTOP50", "CASHIETF", "HDFCNIFBAN", "JUNIORBEES", "BSLNIFTY",
    "NV20", "EGOLD", "QGOLDHALF", "UTINIFTETF", "MIDSELIETF", "NIFTYCASE",
    "AUTOBEES", "BFSI", "EVIETF", "GILT5YBEES", "MIDSMALL", "INFRAIETF",
    "HDFCMOMENT", "TECH", "EVINDIA", "VAL30IETF", "HDFCNIFTY", "HEALTHY",
    "UTINEXT50", "LIQUID", "BSE500IETF", "NIF100IETF", "CONSUMBEES", "NIFTYETF",
    "PSUBANKADD", "NIFTY1", "NV20BEES", "MOMENTUM", "DIVOPPBEES", "QUAL30IETF",
    "LOWVOL1", "HDFCPVTBAN", "SBIBPB", "BBNPPGOLD", "PSUBANK", "MOMOMENTUM",
    "LIQUIDETF", "MNC", "MOVALUE", "MOENERGY", "GOLD360", "SILVER360",
    "HNGSNGBEES", "HDFCNIFIT", "HEALTHIETF", "INTERNET", "BANKPSU", "NIFTYQLITY",
    "ABSLBANETF", "HDFCNEXT50", "HDFCPSUBK", "NIF100BEES", "MOHEALTH",
    "HDFCNIF100", "BANKNIFTY1", "MIDCAP", "ESG", "SETFNIFBK", "TNIDETF",
    "AXISNIFTY", "ITETFADD", "MOLOWVOL", "UNIONGOLD", "MOGSEC", "AXISVALUE",
    "CONS", "HDFCQUAL", "GSEC10YEAR", "HDFCSENSEX", "HDFCGROWTH", "SETFNN50",
    "SBINEQWETF", "MAKEINDIA", "PVTBANKADD", "MID150", "SETF10GILT", "NIFTY100EW",
    "MSCIINDIA", "HDFCLOWVOL", "CONSUMIETF", "HDFCLIQUID", "HDFCBSE500",
    "SENSEXETF", "MONIFTY100", "EQUAL200", "UTISENSETF", "MOMENTUM30",
    "NIFTY50ADD", "NEXT50", "HDFCVALUE", "EQUAL50ADD", "SENSEXIETF", "SBIETFIT",
    "MOALPHA50", "INFRABEES", "GSEC5IETF", "LICNMID100", "ABSLNN50ET",
    "SHARIABEES", "BANKETF",
];

static STOCK_INDIA_SYMBOLS: &[&str] = &[
    "360ONE", "3MINDIA", "AARTIIND", "ABB", "ABBOTINDIA", "ABCAPITAL", "ABFRL",
    "ACC", "ADANIENSOL", "ADANIENT", "ADANIGREEN", "ADANIPORTS", "ADANIPOWER",
    "AFFLE", "AIAENG", "AJANTPHARM", "ALKEM", "AMBER", "AMBUJACEM", "ANGELONE",
    "APLAPOLLO", "APOLLOHOSP", "APOLLOTYRE", "ASHOKLEY", "ASIANPAINT", "ASTRAL",
    "ATGL", "AUBANK", "AUROPHARMA", "AXISBANK", "BAJAJ-AUTO", "BAJAJFINSV",
    "BAJAJHLDNG", "BAJFINANCE", "BALKRISIND", "BANDHANBNK", "BANKBARODA",
    "BANKINDIA", "BATAINDIA", "BDL", "BEL", "BEML", "BERGEPAINT", "BHARATFORG",
    "BHARTIARTL", "BHEL", "BIOCON", "BLUESTARCO", "BOSCHLTD", "BPCL", "BRITANNIA",
    "BSE", "CAMS", "CANBK", "CDSL", "CEATLTD", "CGPOWER", "CHOLAFIN", "CIPLA",
    "COALINDIA", "COFORGE", "COLPAL", "CONCOR", "COROMANDEL", "CRISIL",
    "CROMPTON", "CUMMINSIND", "CYIENT", "DABUR", "DALBHARAT", "DEEPAKNTR",
    "DELHIVERY", "DIVISLAB", "DIXON", "DLF", "DMART", "DRREDDY", "EICHERMOT",
    "ESCORTS", "EXIDEIND", "FEDERALBNK", "FORTIS", "GAIL", "GLAND", "GLENMARK",
    "GMRAIRPORT", "GODREJCP", "GODREJPROP", "GRANULES", "GRASIM", "HAL",
    "HAVELLS", "HCLTECH", "HDFCAMC", "HDFCBANK", "HDFCLIFE", "HEROMOTOCO",
    "HINDALCO", "HINDPETRO", "HINDUNILVR", "HINDZINC", "HUDCO", "ICICIBANK",
    "ICICIGI", "ICICIPRULI", "IDEA", "IDFCFIRSTB", "IEX", "IGL", "INDHOTEL",
    "INDIANB", "INDIGO", "INDUSINDBK", "INDUSTOWER", "INFY", "IOC", "IPCALAB",
    "IRCTC", "IREDA", "IRFC", "ITC", "JINDALSTEL", "JIOFIN", "JKCEMENT",
    "JSWENERGY", "JSWSTEEL", "JUBLFOOD", "KALYANKJIL", "KAYNES", "KEI",
    "KOTAKBANK", "KPITTECH", "LALPATHLAB", "LAURUSLABS", "LICHSGFIN", "LICI",
    "LODHA", "LT", "LTF", "LTIM", "LTTS", "LUPIN", "M&M", "M&MFIN", "MANAPPURAM",
    "MANKIND", "MARICO", "MARUTI", "MAXHEALTH", "MAZDOCK", "MCX", "MFSL", "MGL",
    "MOTHERSON", "MPHASIS", "MRF", "MUTHOOTFIN", "NATIONALUM", "NAUKRI", "NBCC",
    "NCC", "NESTLEIND", "NHPC", "NMDC", "NTPC", "NYKAA", "OBEROIRLTY", "OFSS",
    "OIL", "ONGC", "PAGEIND", "PATANJALI", "PAYTM", "PEL", "PERSISTENT",
    "PETRONET", "PFC", "PHOENIXLTD", "PIDILITIND", "PIIND", "PNB", "POLICYBZR",
    "POLYCAB", "POONAWALLA", "POWERGRID", "PRESTIGE", "PVRINOX", "RAMCOCEM",
    "RBLBANK", "RECLTD", "RELIANCE", "RVNL", "SAIL", "SBICARD", "SBILIFE",
    "SBIN", "SHREECEM", "SHRIRAMFIN", "SIEMENS", "SJVN", "SONACOMS", "SRF",
    "STARHEALTH", "SUNPHARMA", "SUNTV", "SUPREMEIND", "SUZLON", "SYNGENE",
    "TATACHEM", "TATACOMM", "TATACONSUM", "TATAELXSI", "TATAMOTORS", "TATAPOWER",
    "TATASTEEL", "TATATECH", "TCS", "TECHM", "TITAN", "TORNTPHARM", "TORNTPOWER",
    "TRENT", "TVSMOTOR", "UBL", "ULTRACEMCO", "UNIONBANK", "UNITDSPR", "UPL",
    "VBL", "VEDL", "VOLTAS", "WIPRO", "YESBANK", "ZEEL", "ZYDUSLIFE",
];

static ETF_US_SYMBOLS: &[&str] = &[
    // Broad market
    "SPY", "IVV", "VOO", "VTI", "QQQ", "DIA", "IWM", "VT", "SCHB", "RSP",
    // Financials
    "XLF", "VFH", "IYF", "KBE", "KRE", "IAF",
    // Technology
    "XLK", "VGT", "IGV", "FDN",
    // Healthcare
    "XLV", "VHT", "IHE", "PJP", "XBI", "IBB", "FXH",
    // Energy
    "XLE", "VDE", "IYE", "OIH", "XOP", "IEO", "PXI",
    // Materials and metals
    "XLB", "IYM", "GDX", "GDXJ", "SLV", "GLD", "BAR", "PLTM", "PALL", "PDBC",
    // Consumer discretionary
    "XLY", "VCR", "IYC", "ITB", "XHB",
    // Consumer staples
    "XLP", "VDC",
    // Utilities
    "XLU", "IDU",
    // Real estate
    "VNQ", "IYR", "XLRE",
    // Communication
    "XLC", "VOX",
    // Industrials and transport
    "XLI", "IYT", "XTN", "JETS",
    // Automotive
    "CARZ", "MOTO", "IDRV",
    // International
    "EEM", "VEA",
    // Bonds
    "AGG", "BND", "BSV", "VGSH", "SPTS", "VTIP", "IEI", "SHY", "MINT", "NEAR",
    "BIL",
    // Commodities
    "USO", "DJP", "DBA", "DBB", "JO", "JJU", "DBC",
    // Thematic
    "ITA", "CHAT", "TAN", "IBAT", "NLR", "UCO", "UNG", "SMDV", "NOBL", "OILK",
    "GLDM", "SCHD", "DIVO", "MOAT",
    // Short / inverse
    "SH", "PSQ", "SDS", "SPXS", "SPXU", "QID", "SQQQ", "DOG", "DXD", "SDOW",
    "SEF", "SKF", "FAZ", "SSG", "SOXS", "TECS", "SRS", "DUG", "TBT", "TMV",
    "SARK",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_symbol_mapping() {
        assert_eq!(Universe::EtfIndia.provider_symbol("GOLDBEES"), "GOLDBEES.NS");
        assert_eq!(Universe::StockIndia.provider_symbol("RELIANCE"), "RELIANCE.NS");
        assert_eq!(Universe::EtfUs.provider_symbol("SPY"), "SPY");
        assert_eq!(Universe::Index.provider_symbol("NIFTY50"), "^NSEI");
    }

    #[test]
    fn test_floor_dates() {
        assert_eq!(
            Universe::EtfIndia.floor_date(),
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
        );
        assert_eq!(
            Universe::EtfUs.floor_date(),
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_only_us_universe_updates_on_conflict() {
        for universe in Universe::ALL {
            let expected = if universe == Universe::EtfUs {
                ConflictPolicy::UpdateLatest
            } else {
                ConflictPolicy::DoNothing
            };
            assert_eq!(universe.incremental_policy(), expected);
        }
    }

    #[test]
    fn test_symbol_lists_have_no_duplicates() {
        for universe in Universe::ALL {
            let mut seen = std::collections::HashSet::new();
            for symbol in universe.symbols() {
                assert!(seen.insert(*symbol), "duplicate symbol {symbol} in {}", universe.name());
            }
        }
    }
}
