pub const INTV_ADDR: u16 = 0xFFFE;
pub const RESV_ADDR: u16 = 0xFFFC;
pub const NMIV_ADDR: u16 = 0xFFFA;
pub const MMC_ADDR: u16 = 0xFFF9;
pub const RAM_HOLE_ADDR: u16 = 0xFFF8;
pub const ROM_ADDR: u16 = 0xFE00;
pub const MIK_ADDR: u16 = 0xFD00;
pub const SUZ_ADDR: u16 = 0xFC00;

pub const SUZ_ADDR_B: u16 = SUZ_ADDR - 1;
pub const MIK_ADDR_B: u16 = MIK_ADDR - 1;
pub const ROM_ADDR_B: u16 = ROM_ADDR - 1;
pub const ROM_END: u16 = RAM_HOLE_ADDR - 1;
pub const INTV_ADDR_A: u16 = INTV_ADDR + 1;

// "The basic timing tick of the system is 62.5 ns. Let us now define the
// term tick to be 62.5 ns."
pub const CRYSTAL_FREQ: u32 = 16_000_000;

// "A page mode op-code read takes 4 ticks, a normal read or write to RAM
// takes 5 ticks."
pub const RAM_PAGE_TICKS: u32 = 4;
pub const RAM_NORMAL_TICKS: u32 = 5;
pub const SUZY_DMA_TICKS: u32 = 3;

// Multiplies take 44 ticks, 54 with sign or accumulate. Divides take
// 176 + 14 * (leading zeros of the divisor).
pub const MATH_MULT_TICKS: u32 = 44;
pub const MATH_MULT_SIGN_TICKS: u32 = 54;
pub const MATH_DIV_BASE_TICKS: u32 = 176;
pub const MATH_DIV_ZERO_TICKS: u32 = 14;

pub const COMLYNX_BIT_TICKS: u64 = 16;

pub const MAPCTL_VEC_BIT: u8 = 0b0000_1000;
pub const MAPCTL_ROM_BIT: u8 = 0b0000_0100;
pub const MAPCTL_MIK_BIT: u8 = 0b0000_0010;
pub const MAPCTL_SUZ_BIT: u8 = 0b0000_0001;

pub const TIM0BKUP: u16 = 0xFD00;
pub const TIM0CTLA: u16 = 0xFD01;
pub const TIM0CNT: u16 = 0xFD02;
pub const TIM0CTLB: u16 = 0xFD03;
pub const TIM1BKUP: u16 = 0xFD04;
pub const TIM2BKUP: u16 = 0xFD08;
pub const TIM2CTLA: u16 = 0xFD09;
pub const TIM2CNT: u16 = 0xFD0A;
pub const TIM4BKUP: u16 = 0xFD10;
pub const TIM4CTLA: u16 = 0xFD11;
pub const TIM7CTLB: u16 = 0xFD1F;
pub const AUD0VOL: u16 = 0xFD20;
pub const AUD0SHFTFB: u16 = 0xFD21;
pub const AUD0OUTVAL: u16 = 0xFD22;
pub const AUD0L8SHFT: u16 = 0xFD23;
pub const AUD0TBACK: u16 = 0xFD24;
pub const AUD0CTL: u16 = 0xFD25;
pub const AUD0COUNT: u16 = 0xFD26;
pub const AUD0MISC: u16 = 0xFD27;
pub const AUD3MISC: u16 = 0xFD3F;
pub const ATTEN_A: u16 = 0xFD40;
pub const ATTEN_B: u16 = 0xFD41;
pub const ATTEN_C: u16 = 0xFD42;
pub const ATTEN_D: u16 = 0xFD43;
pub const MPAN: u16 = 0xFD44;
pub const MSTEREO: u16 = 0xFD50;
pub const INTRST: u16 = 0xFD80;
pub const INTSET: u16 = 0xFD81;
pub const MAGRDY0: u16 = 0xFD84;
pub const MAGRDY1: u16 = 0xFD85;
pub const AUDIN: u16 = 0xFD86;
pub const SYSCTL1: u16 = 0xFD87;
pub const MIKEYHREV: u16 = 0xFD88;
pub const MIKEYSREV: u16 = 0xFD89;
pub const IODIR: u16 = 0xFD8A;
pub const IODAT: u16 = 0xFD8B;
pub const SERCTL: u16 = 0xFD8C;
pub const SERDAT: u16 = 0xFD8D;
pub const SDONEACK: u16 = 0xFD90;
pub const CPUSLEEP: u16 = 0xFD91;
pub const DISPCTL: u16 = 0xFD92;
pub const PBKUP: u16 = 0xFD93;
pub const DISPADRL: u16 = 0xFD94;
pub const DISPADRH: u16 = 0xFD95;
pub const GREEN0: u16 = 0xFDA0;
pub const GREENF: u16 = 0xFDAF;
pub const BLUERED0: u16 = 0xFDB0;
pub const BLUEREDF: u16 = 0xFDBF;

pub const IODAT_EXTPOWER: u8 = 0b0000_0001;
pub const IODAT_CAD: u8 = 0b0000_0010;
pub const IODAT_NOEXP: u8 = 0b0000_0100;
pub const IODAT_RESTLESS: u8 = 0b0000_1000;
pub const IODAT_AUDIN: u8 = 0b0001_0000;
pub const SYSCTL1_CAS: u8 = 0b0000_0001;
pub const SYSCTL1_POWER: u8 = 0b0000_0010;

pub const INT_TIMER0: u8 = 0b0000_0001;
pub const INT_TIMER2: u8 = 0b0000_0100;
pub const INT_UART: u8 = 0b0001_0000;

// Suzy page.
pub const TMPADRL: u16 = 0xFC00;
pub const TMPADRH: u16 = 0xFC01;
pub const TILTACUML: u16 = 0xFC02;
pub const TILTACUMH: u16 = 0xFC03;
pub const HOFFL: u16 = 0xFC04;
pub const VOFFL: u16 = 0xFC06;
pub const VIDBASL: u16 = 0xFC08;
pub const COLLBASL: u16 = 0xFC0A;
pub const VIDADRL: u16 = 0xFC0C;
pub const COLLADRL: u16 = 0xFC0E;
pub const SCBNEXTL: u16 = 0xFC10;
pub const SCBNEXTH: u16 = 0xFC11;
pub const SPRDLINEL: u16 = 0xFC12;
pub const SPRDLINEH: u16 = 0xFC13;
pub const HPOSSTRTL: u16 = 0xFC14;
pub const HPOSSTRTH: u16 = 0xFC15;
pub const VPOSSTRTL: u16 = 0xFC16;
pub const SPRHSIZL: u16 = 0xFC18;
pub const SPRVSIZL: u16 = 0xFC1A;
pub const STRETCHL: u16 = 0xFC1C;
pub const TILTL: u16 = 0xFC1E;
pub const SPRDOFFL: u16 = 0xFC20;
pub const SPRVPOSL: u16 = 0xFC22;
pub const COLLOFFL: u16 = 0xFC24;
pub const VSIZACUML: u16 = 0xFC26;
pub const VSIZACUMH: u16 = 0xFC27;
pub const HSIZOFFL: u16 = 0xFC28;
pub const VSIZOFFL: u16 = 0xFC2A;
pub const SCBADRL: u16 = 0xFC2C;
pub const PROCADRL: u16 = 0xFC2E;
pub const MATHD: u16 = 0xFC52;
pub const MATHC: u16 = 0xFC53;
pub const MATHB: u16 = 0xFC54;
pub const MATHA: u16 = 0xFC55;
pub const MATHP: u16 = 0xFC56;
pub const MATHN: u16 = 0xFC57;
pub const MATHH: u16 = 0xFC60;
pub const MATHG: u16 = 0xFC61;
pub const MATHF: u16 = 0xFC62;
pub const MATHE: u16 = 0xFC63;
pub const MATHM: u16 = 0xFC6C;
pub const MATHL: u16 = 0xFC6D;
pub const MATHK: u16 = 0xFC6E;
pub const MATHJ: u16 = 0xFC6F;
pub const SPRCTL0: u16 = 0xFC80;
pub const SPRCTL1: u16 = 0xFC81;
pub const SPRCOLL: u16 = 0xFC82;
pub const SPRINIT: u16 = 0xFC83;
pub const SUZYHREV: u16 = 0xFC88;
pub const SUZYBUSEN: u16 = 0xFC90;
pub const SPRGO: u16 = 0xFC91;
pub const SPRSYS: u16 = 0xFC92;
pub const JOYSTICK: u16 = 0xFCB0;
pub const SWITCHES: u16 = 0xFCB1;
pub const RCART0: u16 = 0xFCB2;
pub const RCART1: u16 = 0xFCB3;

pub const SPRCTL0_BPP: u8 = 0b1100_0000;
pub const SPRCTL0_HFLIP: u8 = 0b0010_0000;
pub const SPRCTL0_VFLIP: u8 = 0b0001_0000;
pub const SPRCTL0_SPR_TYPE: u8 = 0b0000_0111;

pub const SPRCTL1_LITERAL: u8 = 0b1000_0000;
pub const SPRCTL1_RELOAD_HVST: u8 = 0b0011_0000;
pub const SPRCTL1_RELOAD_HVS: u8 = 0b0010_0000;
pub const SPRCTL1_RELOAD_HV: u8 = 0b0001_0000;
pub const SPRCTL1_REUSE_PALETTE: u8 = 0b0000_1000;
pub const SPRCTL1_SKIP_SPRITE: u8 = 0b0000_0100;
pub const SPRCTL1_DRAW_UP: u8 = 0b0000_0010;
pub const SPRCTL1_DRAW_LEFT: u8 = 0b0000_0001;
pub const SPRCTL1_DRAW_QUAD: u8 = 0b0000_0011;

pub const SPRCOLL_DONT_COLLIDE: u8 = 0b0010_0000;
pub const SPRCOLL_NUMBER: u8 = 0b0000_1111;

pub const SPRGO_GO: u8 = 0b0000_0001;
pub const SPRGO_EVERON: u8 = 0b0000_0100;
